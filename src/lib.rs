//! Client for the Groovify music statistics backend.
//!
//! The backend proxies a music-streaming API and hands out an opaque
//! session token after a browser login. This crate keeps that token on the
//! device, attaches it to requests and reads playlists, listening
//! statistics, now-playing status and AI-generated playlist metadata.
//!
//! # Modules
//!
//! * [`session`] - restoring, establishing and ending a login
//! * [`backend`] - typed endpoint calls
//! * [`http`] - HTTP client carrying the bearer token
//! * [`store`] - persistent token storage
//! * [`redirect`] - login redirect parsing
//! * [`poll`] - periodic now-playing updates
//! * [`protocol`] - wire types
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod poll;
pub mod protocol;
pub mod redirect;
pub mod session;
pub mod store;
pub mod token;
