#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sgm_pipe::{ApiController, DisparityMap, LineTransport, MatchingSession};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Default)]
pub struct MatcherLog {
    pub writes: Vec<String>,
    pub terminations: usize,
}

/// In-process stand-in for the matcher executable.
///
/// Replays `output` line by line; every written command is recorded and
/// handed to the responder, whose lines are queued as the next output.
pub struct FakeMatcher {
    output: VecDeque<String>,
    responder: Box<dyn FnMut(&str) -> Vec<String>>,
    log: Rc<RefCell<MatcherLog>>,
}

impl FakeMatcher {
    pub fn new(
        startup: &[&str],
        responder: impl FnMut(&str) -> Vec<String> + 'static,
    ) -> (Self, Rc<RefCell<MatcherLog>>) {
        let log = Rc::new(RefCell::new(MatcherLog::default()));
        let matcher = Self {
            output: startup.iter().map(|l| format!("{}\r\n", l)).collect(),
            responder: Box::new(responder),
            log: Rc::clone(&log),
        };
        (matcher, log)
    }
}

impl LineTransport for FakeMatcher {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.output.pop_front())
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.log.borrow_mut().writes.push(line.to_string());
        let reply = (self.responder)(line);
        self.output
            .extend(reply.into_iter().map(|l| format!("{}\r\n", l)));
        Ok(())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.log.borrow_mut().terminations += 1;
        Ok(())
    }
}

pub fn ok(payload: &str) -> Vec<String> {
    vec![
        "processing...".to_string(),
        format!("API_RESPONSE:{}", payload),
        "API_READY".to_string(),
    ]
}

pub fn rejected(message: &str) -> Vec<String> {
    vec![
        format!("API_RESPONSE:ERROR,{}", message),
        "API_READY".to_string(),
    ]
}

pub const STARTUP: &[&str] = &["I3DRSGM 1.0.11", "GPU: simulated", "API_READY"];

/// Work dir named in a FORWARD_MATCH command, for both command forms.
pub fn match_work_dir(command: &str) -> PathBuf {
    let fields: Vec<&str> = command.split(',').collect();
    let last = fields.len() - 1;
    if fields[last] == "0" {
        PathBuf::from(fields[last - 1])
    } else {
        PathBuf::from(fields[last])
    }
}

/// Matcher that accepts everything and answers FORWARD_MATCH by writing
/// `disparity` into the requested work dir.
pub fn matcher_producing(disparity: DisparityMap) -> (FakeMatcher, Rc<RefCell<MatcherLog>>) {
    FakeMatcher::new(STARTUP, move |command| {
        if command.starts_with("FORWARD_MATCH,") {
            let path = match_work_dir(command).join("disparity.tif");
            match disparity.write_tiff(&path) {
                Ok(()) => ok("FORWARD_MATCH"),
                Err(err) => rejected(&err.to_string()),
            }
        } else {
            ok(command)
        }
    })
}

pub fn session_with(
    matcher: FakeMatcher,
    work_dir: &Path,
) -> sgm_pipe::Result<MatchingSession<FakeMatcher>> {
    init_logging();
    MatchingSession::from_controller(ApiController::with_transport(matcher), work_dir)
}
