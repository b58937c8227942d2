use crate::error::{ClientError, ClientResult};

/// Commands of the broker's frame protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Message,
    Error,
    Disconnect,
}

impl FrameCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameCommand::Connect => "CONNECT",
            FrameCommand::Connected => "CONNECTED",
            FrameCommand::Subscribe => "SUBSCRIBE",
            FrameCommand::Unsubscribe => "UNSUBSCRIBE",
            FrameCommand::Message => "MESSAGE",
            FrameCommand::Error => "ERROR",
            FrameCommand::Disconnect => "DISCONNECT",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CONNECT" => Some(FrameCommand::Connect),
            "CONNECTED" => Some(FrameCommand::Connected),
            "SUBSCRIBE" => Some(FrameCommand::Subscribe),
            "UNSUBSCRIBE" => Some(FrameCommand::Unsubscribe),
            "MESSAGE" => Some(FrameCommand::Message),
            "ERROR" => Some(FrameCommand::Error),
            "DISCONNECT" => Some(FrameCommand::Disconnect),
            _ => None,
        }
    }
}

/// A single broker frame: command line, header lines, blank line, body,
/// NUL terminator. A bare newline is a heart-beat, not a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: FrameCommand,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// The heart-beat "frame" exchanged in both directions
    pub const HEARTBEAT: &'static str = "\n";

    pub fn new(command: FrameCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, if present
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Build the connect handshake frame
    ///
    /// The token rides in a frame header as well as on the upgrade
    /// request, mirroring the double delivery of the connection URL.
    pub fn connect(heartbeat_ms: u64, access_token: Option<&str>) -> Self {
        let mut frame = Frame::new(FrameCommand::Connect)
            .header("accept-version", "1.2")
            .header("heart-beat", format!("{},{}", heartbeat_ms, heartbeat_ms));
        if let Some(token) = access_token {
            frame = frame.header("Authorization", format!("Bearer {}", token));
        }
        frame
    }

    /// Build a subscription frame for a destination
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(FrameCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
    }

    /// Build an unsubscribe frame
    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(FrameCommand::Unsubscribe).header("id", id)
    }

    /// Build a disconnect frame
    pub fn disconnect() -> Self {
        Frame::new(FrameCommand::Disconnect)
    }

    /// Whether a raw websocket text payload is a heart-beat
    pub fn is_heartbeat(raw: &str) -> bool {
        matches!(raw, "" | "\n" | "\r\n")
    }

    /// Encode the frame to its wire form
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse a frame from its wire form
    pub fn parse(raw: &str) -> ClientResult<Frame> {
        let raw = raw.trim_end_matches('\0');
        if Frame::is_heartbeat(raw) {
            return Err(ClientError::frame("heart-beat is not a frame"));
        }

        let (head, body) = match raw.split_once("\n\n") {
            Some((head, body)) => (head, body),
            None => (raw, ""),
        };

        let mut lines = head.lines();
        let command_line = lines
            .next()
            .ok_or_else(|| ClientError::frame("missing command line"))?;
        let command = FrameCommand::parse(command_line.trim_end_matches('\r'))
            .ok_or_else(|| ClientError::frame(format!("unknown command '{}'", command_line)))?;

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ClientError::frame(format!("malformed header '{}'", line)))?;
            headers.push((name.to_string(), value.to_string()));
        }

        Ok(Frame {
            command,
            headers,
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_frame_encodes_headers() {
        let frame = Frame::connect(25_000, Some("tok-1"));
        let encoded = frame.encode();

        assert!(encoded.starts_with("CONNECT\n"));
        assert!(encoded.contains("accept-version:1.2\n"));
        assert!(encoded.contains("heart-beat:25000,25000\n"));
        assert!(encoded.contains("Authorization:Bearer tok-1\n"));
        assert!(encoded.ends_with("\n\n\0"));
    }

    #[test]
    fn test_parse_message_frame() {
        let raw = "MESSAGE\ndestination:/user/queue/notifications\nsubscription:sub-1\n\n{\"id\":\"n-1\"}\0";
        let frame = Frame::parse(raw).unwrap();

        assert_eq!(frame.command, FrameCommand::Message);
        assert_eq!(
            frame.get_header("destination"),
            Some("/user/queue/notifications")
        );
        assert_eq!(frame.body, "{\"id\":\"n-1\"}");
    }

    #[test]
    fn test_round_trip() {
        let frame = Frame::subscribe("sub-9", "/user/queue/notifications");
        let parsed = Frame::parse(&frame.encode()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_parse_frame_without_body() {
        let frame = Frame::parse("CONNECTED\nversion:1.2\nheart-beat:25000,25000\n\n\0").unwrap();
        assert_eq!(frame.command, FrameCommand::Connected);
        assert_eq!(frame.get_header("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_heartbeat_is_not_a_frame() {
        assert!(Frame::is_heartbeat("\n"));
        assert!(Frame::parse("\n").is_err());
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Frame::parse("NACK\n\n\0").is_err());
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        assert!(Frame::parse("MESSAGE\nno-colon-here\n\nbody\0").is_err());
    }
}
