//! Fixed-width binary codec for wire messages.
//!
//! All integers and floats are little-endian. A message is its opcode
//! followed immediately by its payload fields; there is no framing beyond
//! the opcode because every payload has a statically known shape (arrays
//! carry their own `u32` count).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{opcodes, Answer, Order, ProtoError, MAX_ARRAY_LEN};

/// Write one order to the stream and flush it.
pub async fn write_order<W>(writer: &mut W, order: &Order) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32_le(order.opcode()).await?;
    match order {
        Order::Exist { element } | Order::Insert { element } => {
            writer.write_f32_le(*element).await?;
        }
        Order::InsertMany { elements } => {
            writer.write_u32_le(elements.len() as u32).await?;
            for element in elements {
                writer.write_f32_le(*element).await?;
            }
        }
        Order::Stop
        | Order::HowMany
        | Order::Min
        | Order::Max
        | Order::Sum
        | Order::Print => {}
    }
    writer.flush().await?;
    Ok(())
}

/// Read one order from the stream.
pub async fn read_order<R>(reader: &mut R) -> Result<Order, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let opcode = reader.read_u32_le().await?;
    let order = match opcode {
        opcodes::ORDER_STOP => Order::Stop,
        opcodes::ORDER_HOW_MANY => Order::HowMany,
        opcodes::ORDER_MIN => Order::Min,
        opcodes::ORDER_MAX => Order::Max,
        opcodes::ORDER_EXIST => Order::Exist {
            element: reader.read_f32_le().await?,
        },
        opcodes::ORDER_SUM => Order::Sum,
        opcodes::ORDER_INSERT => Order::Insert {
            element: reader.read_f32_le().await?,
        },
        opcodes::ORDER_INSERT_MANY => {
            let len = reader.read_u32_le().await?;
            if len > MAX_ARRAY_LEN {
                return Err(ProtoError::ArrayTooLong(len));
            }
            let mut elements = Vec::with_capacity(len as usize);
            for _ in 0..len {
                elements.push(reader.read_f32_le().await?);
            }
            Order::InsertMany { elements }
        }
        opcodes::ORDER_PRINT => Order::Print,
        other => return Err(ProtoError::UnknownOrder(other)),
    };
    Ok(order)
}

/// Write one answer to the stream and flush it.
pub async fn write_answer<W>(writer: &mut W, answer: &Answer) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32_le(answer.opcode()).await?;
    match answer {
        Answer::HowMany { total, distinct } => {
            writer.write_u32_le(*total).await?;
            writer.write_u32_le(*distinct).await?;
        }
        Answer::Min { element } | Answer::Max { element } => {
            writer.write_f32_le(*element).await?;
        }
        Answer::ExistYes { count } => {
            writer.write_u32_le(*count).await?;
        }
        Answer::Sum { total } => {
            writer.write_f32_le(*total).await?;
        }
        Answer::StopOk
        | Answer::MinEmpty
        | Answer::MaxEmpty
        | Answer::ExistNo
        | Answer::InsertOk
        | Answer::InsertManyOk
        | Answer::PrintOk => {}
    }
    writer.flush().await?;
    Ok(())
}

/// Read one answer from the stream.
pub async fn read_answer<R>(reader: &mut R) -> Result<Answer, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let opcode = reader.read_u32_le().await?;
    let answer = match opcode {
        opcodes::ANSWER_STOP_OK => Answer::StopOk,
        opcodes::ANSWER_HOW_MANY_OK => Answer::HowMany {
            total: reader.read_u32_le().await?,
            distinct: reader.read_u32_le().await?,
        },
        opcodes::ANSWER_MIN_EMPTY => Answer::MinEmpty,
        opcodes::ANSWER_MIN_OK => Answer::Min {
            element: reader.read_f32_le().await?,
        },
        opcodes::ANSWER_MAX_EMPTY => Answer::MaxEmpty,
        opcodes::ANSWER_MAX_OK => Answer::Max {
            element: reader.read_f32_le().await?,
        },
        opcodes::ANSWER_EXIST_YES => Answer::ExistYes {
            count: reader.read_u32_le().await?,
        },
        opcodes::ANSWER_EXIST_NO => Answer::ExistNo,
        opcodes::ANSWER_SUM_OK => Answer::Sum {
            total: reader.read_f32_le().await?,
        },
        opcodes::ANSWER_INSERT_OK => Answer::InsertOk,
        opcodes::ANSWER_INSERT_MANY_OK => Answer::InsertManyOk,
        opcodes::ANSWER_PRINT_OK => Answer::PrintOk,
        other => return Err(ProtoError::UnknownAnswer(other)),
    };
    Ok(answer)
}
