//! Hard caps on client-supplied input. Oversized fields are rejected up
//! front so neither the WAL nor the broadcast payloads carry unbounded text.

/// Max byte length of a customer name.
pub const MAX_NAME_LEN: usize = 120;

/// Max byte length of a phone number (international format fits well under this).
pub const MAX_PHONE_LEN: usize = 32;

/// Max byte length of a treatment description.
pub const MAX_TREATMENT_LEN: usize = 120;

/// Max byte length of the free-text extra info field.
pub const MAX_EXTRA_INFO_LEN: usize = 500;

/// Broadcast channel depth per process; slow viewers past this lag drop events.
pub const NOTIFY_CHANNEL_CAPACITY: usize = 256;

/// Depth of the WAL writer command channel.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
