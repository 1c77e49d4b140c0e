//! tenderscrape - tender attachment acquisition pipeline.
//!
//! Drives a browser through procurement portal attachment pages, collects
//! the downloaded files, unwraps signed envelopes and converts legacy
//! documents, optionally mirrors them to the Gemini Files API, and relays
//! the results to a webhook.

pub mod cli;
pub mod config;
pub mod models;
pub mod scrapers;
pub mod server;
pub mod services;
pub mod utils;
pub mod work_queue;
