#![doc = "cloudtile-core: conversion model and pipeline for cloudtile."]

//! This crate holds the tool settings store, the file-kind graph, the
//! conversion orchestrator and the collaborator contracts it composes
//! against. CLI parsing and HTTP transport live in the `cloudtile` crate.
//!
//! # Usage
//! Build a [`converter::Converter`] from a [`contract::ToolRunner`] and a
//! [`contract::ObjectStore`], load a file with it and convert.

pub mod contract;
pub mod converter;
pub mod error;
pub mod geofile;
pub mod kind;
pub mod remote;
pub mod settings;
pub mod storage;
pub mod tools;

pub use converter::{ConvertRequest, Converter, Mode};
pub use error::{Error, Result};
pub use geofile::{FileIdentity, GeoFile};
pub use kind::FileKind;
pub use settings::{SettingValue, TippecanoeSettings, ZoomLevel};
