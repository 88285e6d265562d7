pub mod daemon;
pub mod data;
pub mod helpers;
pub mod remote;
pub mod report;
pub mod settings;
pub mod sync;
