//! Murmur infrastructure
//!
//! Real-time side of the pass-through filter: the lock-free sample ring,
//! the capture drainer and playback sink around it, the worker-thread
//! pipeline, and the CPAL devices that feed and drain it.

pub mod audio;
