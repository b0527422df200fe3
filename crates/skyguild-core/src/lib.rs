//! Timers, progression, session dispatch, and persistence for Skyguild.
//!
//! This crate owns the two halves of the game loop: the timer subsystem
//! (named one-shot countdowns that survive a save/load cycle and reconcile
//! against real elapsed time) and the progression state machine (milestones
//! that unlock resources and features as the ledger grows).
//!
//! # Modules
//!
//! - [`clock`] -- Wall-clock trait, system and manual clocks.
//! - [`config`] -- Configuration loading from `skyguild-config.yaml` into
//!   the immutable game catalog.
//! - [`timer`] -- A single countdown [`Timer`] and its state machine.
//! - [`registry`] -- [`TimerRegistry`]: shared ticking, snapshot, restore.
//! - [`progression`] -- Conditions, milestones, and [`UnlockState`].
//! - [`observer`] -- [`SessionObserver`] presentation seam.
//! - [`session`] -- The [`Session`] context and action dispatch.
//! - [`persistence`] -- [`PersistenceCodec`] and the key-value store seam.
//! - [`runner`] -- The async [`SessionRunner`] tick driver.
//!
//! [`Timer`]: timer::Timer
//! [`TimerRegistry`]: registry::TimerRegistry
//! [`UnlockState`]: progression::UnlockState
//! [`SessionObserver`]: observer::SessionObserver
//! [`Session`]: session::Session
//! [`PersistenceCodec`]: persistence::PersistenceCodec
//! [`SessionRunner`]: runner::SessionRunner

pub mod clock;
pub mod config;
pub mod observer;
pub mod persistence;
pub mod progression;
pub mod registry;
pub mod runner;
pub mod session;
pub mod timer;
