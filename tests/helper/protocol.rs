//! Raw line protocol client

use std::net::SocketAddr;
use std::path::Path;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::{TcpStream, UnixStream};

use pkgupd::server::Response;

pub trait RawStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RawStream for T {}

/// Writes raw bytes and reads response lines, without any validation
pub struct LineClient {
    reader: BufReader<ReadHalf<Box<dyn RawStream>>>,
    writer: WriteHalf<Box<dyn RawStream>>,
}

impl LineClient {
    pub async fn tcp(addr: SocketAddr) -> Self {
        let stream: Box<dyn RawStream> = Box::new(TcpStream::connect(addr).await.unwrap());
        Self::from_stream(stream)
    }

    pub async fn unix(path: &Path) -> Self {
        let stream: Box<dyn RawStream> = Box::new(UnixStream::connect(path).await.unwrap());
        Self::from_stream(stream)
    }

    fn from_stream(stream: Box<dyn RawStream>) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Send `{"RequestType": <request_type>}` and read the response
    pub async fn request(&mut self, request_type: &str) -> Response {
        let line = format!("{{\"RequestType\": \"{}\"}}\n", request_type);
        self.send_raw(line.as_bytes()).await;
        self.read_response().await.expect("connection closed")
    }

    /// Next response line, or `None` once the server closed the connection
    pub async fn read_response(&mut self) -> Option<Response> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await.unwrap();
        if read == 0 {
            return None;
        }
        Some(serde_json::from_str(line.trim_end()).unwrap())
    }
}

/// Names of the packages in a successful response
pub fn package_names(response: &Response) -> Vec<String> {
    match response {
        Response::Ok(packages) => packages.iter().map(|p| p.name.clone()).collect(),
        Response::Error(message) => panic!("unexpected error response: {}", message),
    }
}
