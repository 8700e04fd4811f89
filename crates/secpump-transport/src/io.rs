//! `std::io` ストリームのアダプタ

use std::io::{ErrorKind, Read, Write};

use crate::Transport;

/// `Read + Write` を実装するストリーム（`TcpStream` など）をトランスポートとして使う
#[derive(Debug)]
pub struct IoTransport<S> {
    stream: S,
}

impl<S: Read + Write> IoTransport<S> {
    pub fn new(stream: S) -> Self {
        IoTransport { stream }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Transport for IoTransport<S> {
    type Error = std::io::Error;

    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        loop {
            match self.stream.write(buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Ok(n) => {
                    self.stream.flush()?;
                    return Ok(n);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        loop {
            match self.stream.read(buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 書いたものがそのまま読める擬似ストリーム
    #[derive(Default)]
    struct Loopback {
        data: VecDeque<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_send_then_recv() {
        let mut transport = IoTransport::new(Loopback::default());
        assert_eq!(transport.send(b"record").unwrap(), 6);

        let mut buf = [0u8; 16];
        assert_eq!(transport.recv(&mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"record");
        // 空になったら 0（切断扱い）
        assert_eq!(transport.recv(&mut buf).unwrap(), 0);
    }
}
