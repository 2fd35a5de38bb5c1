//! GRBL protocol: response classification, status reports and code decoding

pub mod error_decoder;
pub mod response_parser;
pub mod status_parser;

pub use error_decoder::{alarm_message, error_message, format_alarm, format_error};
pub use response_parser::GrblResponse;
pub use status_parser::{BufferState, MachineState, Position, StatusReport};
