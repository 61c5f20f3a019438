//! Temporaries, labels and the authority that issues them.
//!
//! Every component that needs a fresh virtual register or code label receives
//! the [`TempAuthority`] explicitly; there are no process-wide counters, so two
//! compilations (or two tests) never observe each other's numbering.

use hashbrown::HashMap;
use std::fmt;

/// A virtual register. Unique per authority and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(u32);

impl Temp {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A code or data address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    /// Label with a fixed, externally visible name (runtime functions, entry point).
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Temp-to-name table that may be layered over a parent table.
///
/// Lookups that miss in this layer fall through to the parent. A per-function
/// layer can therefore shadow the global register names without copying them.
#[derive(Debug, Default)]
pub struct TempMap<'p> {
    names: HashMap<Temp, String>,
    parent: Option<&'p TempMap<'p>>,
}

impl<'p> TempMap<'p> {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
            parent: None,
        }
    }

    /// Create an empty layer whose misses are answered by `parent`.
    pub fn layered_over(parent: &'p TempMap<'p>) -> Self {
        Self {
            names: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Name a temp in this layer, shadowing any name in outer layers.
    pub fn insert(&mut self, temp: Temp, name: impl Into<String>) {
        self.names.insert(temp, name.into());
    }

    pub fn lookup(&self, temp: Temp) -> Option<&str> {
        let mut layer = Some(self);
        while let Some(map) = layer {
            if let Some(name) = map.names.get(&temp) {
                return Some(name.as_str());
            }
            layer = map.parent;
        }
        None
    }

    /// Name of `temp`, falling back to its numeric form.
    pub fn name(&self, temp: Temp) -> String {
        match self.lookup(temp) {
            Some(name) => name.to_string(),
            None => temp.to_string(),
        }
    }

    /// Number of names held by this layer alone.
    pub fn local_len(&self) -> usize {
        self.names.len()
    }
}

/// Issues fresh temps and labels and owns the global name layer.
#[derive(Debug, Default)]
pub struct TempAuthority {
    next_temp: u32,
    next_label: u32,
    names: TempMap<'static>,
}

impl TempAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_temp(&mut self) -> Temp {
        let temp = Temp(self.next_temp);
        self.next_temp += 1;
        temp
    }

    /// Fresh temp recorded in the global name layer (machine registers).
    pub fn named_temp(&mut self, name: &str) -> Temp {
        let temp = self.new_temp();
        self.names.insert(temp, name);
        temp
    }

    /// Fresh anonymous label. The leading dot keeps it out of the source namespace.
    pub fn new_label(&mut self) -> Label {
        let label = Label(format!(".L{}", self.next_label));
        self.next_label += 1;
        label
    }

    /// Fresh label derived from a source-level name, e.g. a nested function.
    pub fn new_label_for(&mut self, name: &str) -> Label {
        let label = Label(format!("{}.{}", name, self.next_label));
        self.next_label += 1;
        label
    }

    /// The global name layer.
    pub fn names(&self) -> &TempMap<'static> {
        &self.names
    }

    pub fn temps_issued(&self) -> u32 {
        self.next_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temps_and_labels_are_unique() {
        let mut temps = TempAuthority::new();
        let a = temps.new_temp();
        let b = temps.new_temp();
        assert_ne!(a, b);
        assert_ne!(temps.new_label(), temps.new_label());
        assert_ne!(temps.new_label_for("f"), temps.new_label_for("f"));
        assert_eq!(temps.temps_issued(), 2);
    }

    #[test]
    fn test_fresh_authorities_are_independent() {
        let mut first = TempAuthority::new();
        let mut second = TempAuthority::new();
        assert_eq!(first.new_temp(), second.new_temp());
        assert_eq!(first.new_label(), second.new_label());
    }

    #[test]
    fn test_layered_lookup_falls_through() {
        let mut temps = TempAuthority::new();
        let rax = temps.named_temp("rax");
        let local = temps.new_temp();

        let mut layer = TempMap::layered_over(temps.names());
        layer.insert(local, "counter");

        assert_eq!(layer.lookup(rax), Some("rax"));
        assert_eq!(layer.lookup(local), Some("counter"));
        assert_eq!(temps.names().lookup(local), None);
        assert_eq!(layer.local_len(), 1);
    }

    #[test]
    fn test_inner_layer_shadows_outer() {
        let mut temps = TempAuthority::new();
        let rbx = temps.named_temp("rbx");
        let unnamed = temps.new_temp();
        let mut layer = TempMap::layered_over(temps.names());
        layer.insert(rbx, "saved");
        assert_eq!(layer.name(rbx), "saved");
        assert_eq!(temps.names().name(rbx), "rbx");
        assert_eq!(layer.name(unnamed), unnamed.to_string());
    }
}
