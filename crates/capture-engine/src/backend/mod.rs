//! Real capture hosts.

pub mod gst_host;

pub use gst_host::{GstEncoder, GstGraph, GstHost, GstHostOptions, GstMediaElement, GstTrack};
