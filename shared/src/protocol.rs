//! Text protocol spoken over UDP between the server and its two clients.
//!
//! Every message is a single ASCII datagram. Fields are separated by `;` and the
//! whole datagram is trimmed before parsing. Inbound messages (client to server)
//! are [`ClientPacket`]s, outbound ones are [`ServerPacket`]s. Nothing outside
//! this module knows about the textual layout.

use std::fmt::Write;
use thiserror::Error;

const FIELD_SEPARATOR: char = ';';
const SNAPSHOT_PREFIX: &str = "SNAP;";

/// Errors raised while decoding a datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("datagram is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown message {0:?}")]
    UnknownMessage(String),

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value {value:?} for field `{field}`")]
    InvalidField { field: &'static str, value: String },

    #[error("{0} unexpected trailing fields")]
    TrailingFields(usize),
}

/// Messages sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPacket {
    /// `Conexion`
    Connect,
    /// `Listo`
    Ready,
    /// `RESET`
    ResetAck,
    /// `INPUT;<jump>;<crouch>`
    Input { jump: bool, crouch: bool },
}

impl ClientPacket {
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::parse(text)
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        match text {
            "Conexion" => return Ok(ClientPacket::Connect),
            "Listo" => return Ok(ClientPacket::Ready),
            "RESET" => return Ok(ClientPacket::ResetAck),
            _ => {}
        }

        if !text.starts_with("INPUT;") {
            return Err(ProtocolError::UnknownMessage(text.to_string()));
        }

        // A single field terminator after the last flag is allowed.
        let fields = text.strip_suffix(FIELD_SEPARATOR).unwrap_or(text);
        let parts: Vec<&str> = fields.split(FIELD_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(ProtocolError::FieldCount {
                expected: 3,
                found: parts.len(),
            });
        }

        Ok(ClientPacket::Input {
            jump: parse_flag("jump", parts[1])?,
            crouch: parse_flag("crouch", parts[2])?,
        })
    }

    pub fn encode(&self) -> String {
        match self {
            ClientPacket::Connect => "Conexion".to_string(),
            ClientPacket::Ready => "Listo".to_string(),
            ClientPacket::ResetAck => "RESET".to_string(),
            ClientPacket::Input { jump, crouch } => {
                format!("INPUT;{};{}", flag(*jump), flag(*crouch))
            }
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    /// `OK`: connection accepted, or the endpoint was already connected.
    Accepted,
    /// `Full`: both slots are taken.
    Full,
    /// `Empieza`: both players are ready and the match begins.
    Start,
    /// `SNAP;...`: authoritative state for one tick.
    Snapshot(Snapshot),
}

impl ServerPacket {
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::parse(text)
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        match text {
            "OK" => Ok(ServerPacket::Accepted),
            "Full" => Ok(ServerPacket::Full),
            "Empieza" => Ok(ServerPacket::Start),
            _ => match text.strip_prefix(SNAPSHOT_PREFIX) {
                Some(body) => Snapshot::parse_body(body).map(ServerPacket::Snapshot),
                None => Err(ProtocolError::UnknownMessage(text.to_string())),
            },
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ServerPacket::Accepted => "OK".to_string(),
            ServerPacket::Full => "Full".to_string(),
            ServerPacket::Start => "Empieza".to_string(),
            ServerPacket::Snapshot(snapshot) => snapshot.encode(),
        }
    }
}

/// The two obstacle kinds. The wire code is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleKind {
    GroundHazard,
    Flyer,
}

impl ObstacleKind {
    pub fn code(self) -> u8 {
        match self {
            ObstacleKind::GroundHazard => 0,
            ObstacleKind::Flyer => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ObstacleKind::GroundHazard),
            1 => Some(ObstacleKind::Flyer),
            _ => None,
        }
    }
}

/// Per-player fields carried in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub y: f32,
    pub grounded: bool,
    pub crouching: bool,
    pub alive: bool,
}

/// Per-obstacle fields carried in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleSnapshot {
    pub kind: ObstacleKind,
    pub variant: u8,
    pub x: f32,
    pub y: f32,
}

/// Full authoritative state for one rendered frame.
///
/// Field order on the wire:
/// `SNAP;tick;score;velocity;started;terminated;endMessage;resetAckCount;`
/// followed by four fields per player, the obstacle count and four fields per
/// obstacle. Every field, including the last one, is terminated by `;`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub tick: u32,
    pub score: u32,
    pub velocity: f32,
    pub started: bool,
    pub terminated: bool,
    pub end_message: String,
    pub reset_ack_count: u8,
    pub players: [PlayerSnapshot; 2],
    pub obstacles: Vec<ObstacleSnapshot>,
}

impl Snapshot {
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(128 + self.obstacles.len() * 32);
        out.push_str(SNAPSHOT_PREFIX);

        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{};{};{};{};{};{};{};",
            self.tick,
            self.score,
            self.velocity,
            flag(self.started),
            flag(self.terminated),
            sanitize(&self.end_message),
            self.reset_ack_count,
        );

        for player in &self.players {
            let _ = write!(
                out,
                "{};{};{};{};",
                player.y,
                flag(player.grounded),
                flag(player.crouching),
                flag(player.alive),
            );
        }

        let _ = write!(out, "{};", self.obstacles.len());
        for obstacle in &self.obstacles {
            let _ = write!(
                out,
                "{};{};{};{};",
                obstacle.kind.code(),
                obstacle.variant,
                obstacle.x,
                obstacle.y,
            );
        }

        out
    }

    fn parse_body(body: &str) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(body);

        let tick = fields.parse("tick")?;
        let score = fields.parse("score")?;
        let velocity = fields.parse("velocity")?;
        let started = fields.flag("started")?;
        let terminated = fields.flag("terminated")?;
        let end_message = fields.next("end_message")?.to_string();
        let reset_ack_count = fields.parse("reset_ack_count")?;

        let mut players = [PlayerSnapshot::default(); 2];
        for player in players.iter_mut() {
            *player = PlayerSnapshot {
                y: fields.parse("player.y")?,
                grounded: fields.flag("player.grounded")?,
                crouching: fields.flag("player.crouching")?,
                alive: fields.flag("player.alive")?,
            };
        }

        let count: usize = fields.parse("obstacle_count")?;
        let mut obstacles = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let code: u8 = fields.parse("obstacle.kind")?;
            let kind = ObstacleKind::from_code(code).ok_or(ProtocolError::InvalidField {
                field: "obstacle.kind",
                value: code.to_string(),
            })?;
            obstacles.push(ObstacleSnapshot {
                kind,
                variant: fields.parse("obstacle.variant")?,
                x: fields.parse("obstacle.x")?,
                y: fields.parse("obstacle.y")?,
            });
        }

        fields.finish()?;

        Ok(Snapshot {
            tick,
            score,
            velocity,
            started,
            terminated,
            end_message,
            reset_ack_count,
            players,
            obstacles,
        })
    }
}

/// Cursor over the `;`-separated fields of a snapshot body.
struct Fields<'a> {
    parts: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            parts: body.split(FIELD_SEPARATOR),
        }
    }

    fn next(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        self.parts.next().ok_or(ProtocolError::MissingField(field))
    }

    fn parse<T: std::str::FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let value = self.next(field)?;
        value.parse().map_err(|_| ProtocolError::InvalidField {
            field,
            value: value.to_string(),
        })
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, ProtocolError> {
        let value = self.next(field)?;
        parse_flag(field, value)
    }

    /// Only the empty remainder after the final `;` may be left.
    fn finish(mut self) -> Result<(), ProtocolError> {
        let rest: Vec<&str> = self.parts.by_ref().filter(|p| !p.is_empty()).collect();
        if rest.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingFields(rest.len()))
        }
    }
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ProtocolError> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ProtocolError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Free text must not introduce extra fields.
fn sanitize(text: &str) -> String {
    text.replace(FIELD_SEPARATOR, ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            tick: 42,
            score: 7,
            velocity: 277.5,
            started: true,
            terminated: false,
            end_message: String::new(),
            reset_ack_count: 0,
            players: [
                PlayerSnapshot {
                    y: 60.0,
                    grounded: true,
                    crouching: true,
                    alive: true,
                },
                PlayerSnapshot {
                    y: 95.25,
                    grounded: false,
                    crouching: false,
                    alive: true,
                },
            ],
            obstacles: vec![
                ObstacleSnapshot {
                    kind: ObstacleKind::GroundHazard,
                    variant: 3,
                    x: 812.5,
                    y: 60.0,
                },
                ObstacleSnapshot {
                    kind: ObstacleKind::Flyer,
                    variant: 1,
                    x: 1200.0,
                    y: 110.0,
                },
            ],
        }
    }

    #[test]
    fn test_parse_lifecycle_messages() {
        assert_eq!(ClientPacket::parse("Conexion"), Ok(ClientPacket::Connect));
        assert_eq!(ClientPacket::parse("Listo"), Ok(ClientPacket::Ready));
        assert_eq!(ClientPacket::parse("RESET"), Ok(ClientPacket::ResetAck));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(
            ClientPacket::parse("  Conexion\r\n"),
            Ok(ClientPacket::Connect)
        );
        assert_eq!(
            ClientPacket::decode(b"INPUT;1;0\n"),
            Ok(ClientPacket::Input {
                jump: true,
                crouch: false
            })
        );
    }

    #[test]
    fn test_parse_input_flags() {
        assert_eq!(
            ClientPacket::parse("INPUT;0;1"),
            Ok(ClientPacket::Input {
                jump: false,
                crouch: true
            })
        );
        assert_eq!(
            ClientPacket::parse("INPUT;0;0"),
            Ok(ClientPacket::Input {
                jump: false,
                crouch: false
            })
        );
    }

    #[test]
    fn test_input_with_wrong_field_count_is_rejected() {
        assert_eq!(
            ClientPacket::parse("INPUT;1"),
            Err(ProtocolError::FieldCount {
                expected: 3,
                found: 2
            })
        );
        assert!(ClientPacket::parse("INPUT;1;0;1").is_err());
        assert!(ClientPacket::parse("INPUT;1;0;1;").is_err());
        assert!(ClientPacket::parse("INPUT;1;0;;").is_err());
        assert!(ClientPacket::parse("INPUT;").is_err());
    }

    #[test]
    fn test_input_with_trailing_separator_is_accepted() {
        assert_eq!(
            ClientPacket::parse("INPUT;1;0;"),
            Ok(ClientPacket::Input {
                jump: true,
                crouch: false
            })
        );
        assert_eq!(
            ClientPacket::decode(b"INPUT;0;1;\r\n"),
            Ok(ClientPacket::Input {
                jump: false,
                crouch: true
            })
        );
    }

    #[test]
    fn test_input_with_bad_flag_is_rejected() {
        assert_eq!(
            ClientPacket::parse("INPUT;yes;0"),
            Err(ProtocolError::InvalidField {
                field: "jump",
                value: "yes".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_and_binary_messages_are_rejected() {
        assert!(matches!(
            ClientPacket::parse("conexion"),
            Err(ProtocolError::UnknownMessage(_))
        ));
        assert!(ClientPacket::parse("").is_err());
        assert_eq!(
            ClientPacket::decode(&[0xff, 0xfe, 0x00]),
            Err(ProtocolError::InvalidUtf8)
        );
    }

    #[test]
    fn test_client_packet_encoding_matches_grammar() {
        assert_eq!(ClientPacket::Connect.encode(), "Conexion");
        assert_eq!(ClientPacket::Ready.encode(), "Listo");
        assert_eq!(ClientPacket::ResetAck.encode(), "RESET");
        assert_eq!(
            ClientPacket::Input {
                jump: true,
                crouch: false
            }
            .encode(),
            "INPUT;1;0"
        );
    }

    #[test]
    fn test_server_control_messages() {
        assert_eq!(ServerPacket::Accepted.encode(), "OK");
        assert_eq!(ServerPacket::Full.encode(), "Full");
        assert_eq!(ServerPacket::Start.encode(), "Empieza");
        assert_eq!(ServerPacket::parse("Empieza"), Ok(ServerPacket::Start));
        assert_eq!(ServerPacket::parse("Full\n"), Ok(ServerPacket::Full));
    }

    #[test]
    fn test_snapshot_wire_layout() {
        let encoded = sample_snapshot().encode();
        assert_eq!(
            encoded,
            "SNAP;42;7;277.5;1;0;;0;60;1;1;1;95.25;0;0;1;2;0;3;812.5;60;1;1;1200;110;"
        );
    }

    #[test]
    fn test_snapshot_decodes_what_it_encodes() {
        let snapshot = sample_snapshot();
        let decoded = ServerPacket::parse(&snapshot.encode()).unwrap();
        assert_eq!(decoded, ServerPacket::Snapshot(snapshot));
    }

    #[test]
    fn test_end_message_semicolons_are_replaced() {
        let mut snapshot = sample_snapshot();
        snapshot.terminated = true;
        snapshot.end_message = "A;B;C".to_string();
        snapshot.obstacles.clear();

        let encoded = snapshot.encode();
        assert!(encoded.contains(";A,B,C;"));

        match ServerPacket::parse(&encoded).unwrap() {
            ServerPacket::Snapshot(decoded) => {
                assert_eq!(decoded.end_message, "A,B,C");
                assert!(decoded.terminated);
                assert_approx_eq!(decoded.velocity, 277.5, 0.001);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_truncated_snapshot_is_rejected() {
        let encoded = sample_snapshot().encode();
        let truncated = &encoded[..encoded.len() - 10];
        assert!(ServerPacket::parse(truncated).is_err());
    }

    #[test]
    fn test_snapshot_with_unknown_obstacle_kind_is_rejected() {
        let text = "SNAP;1;0;260;1;0;;0;60;1;0;1;60;1;0;1;1;7;0;100;60;";
        assert_eq!(
            ServerPacket::parse(text),
            Err(ProtocolError::InvalidField {
                field: "obstacle.kind",
                value: "7".to_string()
            })
        );
    }

    #[test]
    fn test_snapshot_with_extra_fields_is_rejected() {
        let text = "SNAP;1;0;260;1;0;;0;60;1;0;1;60;1;0;1;0;9;9;";
        assert_eq!(
            ServerPacket::parse(text),
            Err(ProtocolError::TrailingFields(2))
        );
    }

    #[test]
    fn test_obstacle_kind_codes() {
        assert_eq!(ObstacleKind::GroundHazard.code(), 0);
        assert_eq!(ObstacleKind::Flyer.code(), 1);
        assert_eq!(ObstacleKind::from_code(1), Some(ObstacleKind::Flyer));
        assert_eq!(ObstacleKind::from_code(2), None);
    }
}
