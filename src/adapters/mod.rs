//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                  |
//! |------------|--------------------|------------------------------|
//! | `hardware` | PressurePort       | ESP32 ADC (pressure sensor)  |
//! |            | ValvePort          | Relay bank on GPIO outputs   |
//! |            | DelayPort          | (delegates to `time`)        |
//! | `log_sink` | EventSink          | Serial log output            |
//! | `nvs`      | ConfigPort         | NVS / in-memory store        |
//! |            | StoragePort        |                              |
//! | `time`     | DelayPort          | FreeRTOS / thread sleep      |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
