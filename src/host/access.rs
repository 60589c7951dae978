use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use packbytes::{FromBytes, ToBytes, ByteArray};
use log::*;

use crate::{
    frame::{Transaction, Direction, READY, MAX_CHUNK, READ_LATENCY},
    registers::Register,
    };
use super::{Error, Transport};


/**
    aligned memory access

    The chip pipelines its serial interface internally, so read data does not come synchronously with the request: after the address the chip clocks out an unknown number of filler bytes, then [READY], then the data. Reads are therefore split in chunks of at most [MAX_CHUNK] bytes, each chunk requesting [READ_LATENCY] more bytes than needed and scanning them for the ready byte.
*/
impl<S: SpiBus, P: OutputPin> Transport<S, P> {
    /// read a register's value
    pub async fn read<T: FromBytes>(&self, register: Register<T>) -> Result<T, Error> {
        let mut buffer = T::Bytes::zeroed();
        self.read_bytes(register.address(), buffer.as_mut()).await?;
        Ok(T::from_le_bytes(buffer))
    }
    /// write a register's value
    pub async fn write<T: ToBytes>(&self, register: Register<T>, value: T) -> Result<(), Error> {
        self.write_bytes(register.address(), value.to_le_bytes().as_ref()).await
    }

    /**
        fill `data` with the chip memory starting at `address`

        both `address` and `data.len()` must be multiples of 4
    */
    pub async fn read_bytes<'d>(&self, address: u32, data: &'d mut [u8]) -> Result<&'d mut [u8], Error> {
        let mut transaction = Transaction::new(address, Direction::Read, data.len())?;
        if data.is_empty()
            {return Ok(data)}
        let mut chunks = data.chunks_mut(MAX_CHUNK).peekable();
        while let Some(chunk) = chunks.next() {
            transaction.length = chunk.len() as u32;
            self.read_chunk(transaction, chunk).await?;
            if let Some(next) = chunks.peek() {
                transaction = transaction.advance(next.len())?;
            }
        }
        Ok(data)
    }

    /**
        write `data` to the chip memory starting at `address`

        both `address` and `data.len()` must be multiples of 4. The chip gives no answer to writes.
    */
    pub async fn write_bytes(&self, address: u32, data: &[u8]) -> Result<(), Error> {
        let transaction = Transaction::new(address, Direction::Write, data.len())?;
        let mut frame = self.select().await?;
        frame.write(&transaction.header()).await?;
        frame.write(data).await?;
        frame.close().await
    }

    /// read one chunk in its own chip select frame
    async fn read_chunk(&self, transaction: Transaction, data: &mut [u8]) -> Result<(), Error> {
        let size = data.len();
        let mut frame = self.select().await?;
        frame.write(&transaction.header()).await?;

        // request enough bytes to cover the chip latency and the payload at once
        let mut buffer = [0u8; READ_LATENCY + MAX_CHUNK];
        let response = &mut buffer[.. READ_LATENCY + size];
        frame.read(response).await?;

        let received = match response.iter().position(|&byte| byte == READY) {
            Some(ready) => {
                let payload = &response[ready+1 ..];
                let received = payload.len().min(size);
                data[.. received].copy_from_slice(&payload[.. received]);
                received
            },
            None => {
                // slow device, poll until it is ready, there is no bound to this wait
                debug!("no ready byte in first {} bytes at {:#010x}, polling", response.len(), transaction.address);
                let mut byte = [0];
                while byte[0] == 0 {
                    frame.read(&mut byte).await?;
                }
                0
            },
        };
        // complete a partial response
        if received < size {
            frame.read(&mut data[received ..]).await?;
        }
        frame.close().await
    }
}
