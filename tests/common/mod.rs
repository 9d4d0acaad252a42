//! Scripted transport shared by the end-to-end tests
//!
//! Links never touch the network; the test decides when each one opens,
//! receives a message, or closes.

#![allow(dead_code)]

use signalmonitor::link::transport::{Connector, Link, LinkEvent, LinkEventKind, LinkEventSender};
use signalmonitor::link::LinkError;
use signalmonitor::render::surface::MemorySurface;
use signalmonitor::{AcquisitionSession, SessionConfig, SignalSynthesizer, Viewport};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Wire {
    /// (link id, event sender) for every link opened, oldest first
    pub opened: Vec<(u64, LinkEventSender)>,
    /// Text frames written to any link
    pub sent: Vec<String>,
    pub closed: usize,
    /// When set, `open` fails instead of returning a link
    pub refuse: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedWire(pub Arc<Mutex<Wire>>);

impl ScriptedWire {
    /// Emit an event on the most recently opened link
    pub fn emit(&self, kind: LinkEventKind) {
        let wire = self.0.lock().unwrap();
        let (link, events) = wire.opened.last().expect("no link opened");
        events.send(LinkEvent::new(*link, kind)).unwrap();
    }

    /// Emit an event on the `index`-th link ever opened
    pub fn emit_on(&self, index: usize, kind: LinkEventKind) {
        let wire = self.0.lock().unwrap();
        let (link, events) = &wire.opened[index];
        events.send(LinkEvent::new(*link, kind)).unwrap();
    }

    pub fn message(&self, json: &str) {
        self.emit(LinkEventKind::Message(json.to_string()));
    }

    pub fn opened(&self) -> usize {
        self.0.lock().unwrap().opened.len()
    }

    pub fn sent(&self) -> Vec<String> {
        self.0.lock().unwrap().sent.clone()
    }

    pub fn closed(&self) -> usize {
        self.0.lock().unwrap().closed
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.0.lock().unwrap().refuse = refuse;
    }

    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(ScriptedConnector(self.clone()))
    }
}

struct ScriptedConnector(ScriptedWire);

struct ScriptedLink(ScriptedWire);

impl Connector for ScriptedConnector {
    fn open(
        &mut self,
        _endpoint: &str,
        link: u64,
        events: LinkEventSender,
    ) -> Result<Box<dyn Link>, LinkError> {
        let mut wire = self.0 .0.lock().unwrap();
        if wire.refuse {
            return Err(LinkError::Transport("connection refused".into()));
        }
        wire.opened.push((link, events));
        Ok(Box::new(ScriptedLink(self.0.clone())))
    }
}

impl Link for ScriptedLink {
    fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        self.0 .0.lock().unwrap().sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.0 .0.lock().unwrap().closed += 1;
    }
}

/// Session on a scripted wire with a seeded synthesizer and an 800×400 surface
pub fn scripted_session(
    config: SessionConfig,
) -> (AcquisitionSession<MemorySurface>, ScriptedWire, MemorySurface) {
    let wire = ScriptedWire::default();
    let surface = MemorySurface::new(Viewport::new(800.0, 400.0));
    let session = AcquisitionSession::with_synthesizer(
        &config,
        wire.connector(),
        surface.clone(),
        SignalSynthesizer::with_seed(42),
    );
    (session, wire, surface)
}

/// Default config without the status indicator simulation
pub fn quiet_config() -> SessionConfig {
    SessionConfig {
        simulate_status_led: false,
        ..SessionConfig::default()
    }
}
