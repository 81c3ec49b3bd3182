//! Storage Layer - account data behind the repository pattern
//!
//! ## Architecture
//! ```text
//! [HTTP auth handlers] [WebSocket handshake]
//!              ↓             ↓
//!            [UserRepo trait]
//!                   ↓
//!          [InMemoryUserRepo]
//! ```
//!
//! World state is memory-resident and never persisted; only accounts go
//! through this layer.

pub mod memory;
pub mod repository;
