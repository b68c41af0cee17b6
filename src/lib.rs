//! Decision-tree explanation views: builds the tree hierarchy from the
//! backend's flat node list, traces the explained instance through it, lays
//! it out as a classic, blocks or spawn view and keeps every view and the
//! neighbourhood scatter plot highlighted in sync.

pub mod app;
pub mod export;
pub mod features;
pub mod io;
pub mod scatter;
pub mod tree;
pub mod ui;
