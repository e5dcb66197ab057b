// Purpose: voice allocation, stealing, sustain, event routing
// This layer sits between the MIDI transport and the synthesis engine

pub mod allocator;
pub mod dispatch;
pub mod registry;
pub mod sustain;

pub use allocator::VoiceAllocator;
pub use dispatch::Dispatcher;
pub use registry::VoiceRegistry;
pub use sustain::SustainTracker;
