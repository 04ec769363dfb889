//! Procedural composition: harmony generation and look-ahead scheduling.

mod harmony;
mod scheduler;

pub use harmony::{
    frequency_for, HarmonyEngine, NoteRequest, PitchClass, Scale, StepSequence, VoiceRole,
    REFERENCE_HZ, SEQUENCE_STEPS,
};
pub use scheduler::{NoteScheduler, ScheduledNote};
