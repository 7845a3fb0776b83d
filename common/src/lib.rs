//! Value objects shared between the feed manager core and whatever transport sits on
//! top of it. Everything here is plain serde data; the behaviour lives in `feedmgr`.

pub mod jobs;
pub mod model;
pub mod requests;
