//! Scripted device doubles for driving the loops without hardware.

use std::collections::VecDeque;
use std::time::Duration;

use ftcal_traits::{BoxError, RawLineSource, ReferenceSensor};

/// One scripted read.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Ok(T),
    Timeout,
    Fail(String),
}

fn play<T>(steps: &mut VecDeque<Step<T>>) -> Result<T, BoxError> {
    match steps.pop_front() {
        Some(Step::Ok(v)) => Ok(v),
        Some(Step::Timeout) => Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timeout",
        ))),
        Some(Step::Fail(msg)) => Err(Box::new(std::io::Error::other(msg))),
        None => Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "script exhausted",
        ))),
    }
}

/// Raw line source that replays a fixed script, then reports end of stream.
#[derive(Debug, Default)]
pub struct ScriptedLines {
    steps: VecDeque<Step<String>>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: lines.into_iter().map(|l| Step::Ok(l.into())).collect(),
        }
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step<String>>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl RawLineSource for ScriptedLines {
    fn read_line(&mut self, _timeout: Duration) -> Result<String, BoxError> {
        play(&mut self.steps)
    }
}

/// Reference sensor that replays a fixed list of frames.
#[derive(Debug, Default)]
pub struct ScriptedReference {
    steps: VecDeque<Step<Vec<u8>>>,
}

impl ScriptedReference {
    pub fn from_steps(steps: impl IntoIterator<Item = Step<Vec<u8>>>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }
}

impl ReferenceSensor for ScriptedReference {
    fn read_frame(&mut self, _timeout: Duration) -> Result<Vec<u8>, BoxError> {
        play(&mut self.steps)
    }
}

/// Format one raw record line the way the sensor firmware does.
pub fn raw_line(seq: i64, raw: &[i32; 8]) -> String {
    let mut s = format!("D {seq} 0");
    for v in raw {
        s.push(' ');
        s.push_str(&v.to_string());
    }
    s
}
