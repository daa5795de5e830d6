//! Minimal broker peer listening on temporary Unix sockets.

use std::io::Write;
use std::os::unix::net::{UnixDatagram, UnixListener, UnixStream};
use std::thread::{self, JoinHandle};

use camino::{Utf8Path, Utf8PathBuf};

/// Broker stand-in: a bound datagram socket and a listener that greets the
/// first stream connection.
pub struct FakeBroker {
    pub datagram_path: Utf8PathBuf,
    pub stream_path: Utf8PathBuf,
    datagram: UnixDatagram,
    acceptor: Option<JoinHandle<UnixStream>>,
}

impl FakeBroker {
    /// Binds both sockets under `dir` and starts greeting with `greeting`.
    pub fn start(dir: &Utf8Path, greeting: &str) -> Self {
        let datagram_path = dir.join("broker.dgram");
        let stream_path = dir.join("broker.sock");
        let datagram =
            UnixDatagram::bind(datagram_path.as_std_path()).expect("bind broker datagram socket");
        let listener =
            UnixListener::bind(stream_path.as_std_path()).expect("bind broker stream socket");
        let framed = format!("{:03}:{greeting}", greeting.len());
        let acceptor = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept worker connection");
            stream
                .write_all(framed.as_bytes())
                .expect("write greeting");
            stream
        });
        Self {
            datagram_path,
            stream_path,
            datagram,
            acceptor: Some(acceptor),
        }
    }

    /// Waits for the worker to connect and returns the broker end.
    pub fn accepted(&mut self) -> UnixStream {
        self.acceptor
            .take()
            .expect("connection already taken")
            .join()
            .expect("acceptor thread panicked")
    }

    /// Receives one datagram sent by the worker.
    pub fn recv_datagram(&self) -> Vec<u8> {
        let mut buf = vec![0_u8; 65_536];
        let read = self.datagram.recv(&mut buf).expect("receive datagram");
        buf.truncate(read);
        buf
    }
}
