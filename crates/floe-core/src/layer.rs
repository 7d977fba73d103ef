// SPDX-License-Identifier: CEPL-1.0
use crate::{Event, Timestep};
use tracing::debug;

/// A slice of application behaviour that receives updates and events.
pub trait Layer {
    fn name(&self) -> &str;
    fn on_attach(&mut self) {}
    fn on_detach(&mut self) {}
    fn on_update(&mut self, _ts: Timestep) {}
    /// Returns `true` when the event was consumed; lower layers will not see it.
    fn on_event(&mut self, _event: &Event) -> bool {
        false
    }
}

/// Ordered layers with overlays always kept above regular layers.
///
/// Updates walk bottom to top, events walk top to bottom.
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn Layer>>,
    // index of the first overlay
    insert_at: usize,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_layer(&mut self, mut layer: Box<dyn Layer>) {
        debug!("attach layer `{}`", layer.name());
        layer.on_attach();
        self.layers.insert(self.insert_at, layer);
        self.insert_at += 1;
    }

    pub fn push_overlay(&mut self, mut overlay: Box<dyn Layer>) {
        debug!("attach overlay `{}`", overlay.name());
        overlay.on_attach();
        self.layers.push(overlay);
    }

    pub fn pop_layer(&mut self, name: &str) -> Option<Box<dyn Layer>> {
        let pos = self.layers[..self.insert_at]
            .iter()
            .position(|l| l.name() == name)?;
        let mut layer = self.layers.remove(pos);
        self.insert_at -= 1;
        layer.on_detach();
        Some(layer)
    }

    pub fn pop_overlay(&mut self, name: &str) -> Option<Box<dyn Layer>> {
        let pos = self.layers[self.insert_at..]
            .iter()
            .position(|l| l.name() == name)?;
        let mut overlay = self.layers.remove(self.insert_at + pos);
        overlay.on_detach();
        Some(overlay)
    }

    pub fn update(&mut self, ts: Timestep) {
        for layer in &mut self.layers {
            layer.on_update(ts);
        }
    }

    /// Returns `true` if some layer handled the event.
    pub fn dispatch(&mut self, event: &Event) -> bool {
        for layer in self.layers.iter_mut().rev() {
            if layer.on_event(event) {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name())
    }
}

impl Drop for LayerStack {
    fn drop(&mut self) {
        for layer in self.layers.iter_mut().rev() {
            layer.on_detach();
        }
    }
}
