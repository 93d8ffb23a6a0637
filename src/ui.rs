//! UI descriptor model (component D).
//!
//! A deterministic build script for whatever concrete control surface a
//! caller provides: the block is a flat, ordered instruction list; driving
//! it against a [`UIBuilder`] implementation is the only way to get at a
//! factory's control layout. Wiring a control to the instance's input/
//! output arrays is purely positional — the N-th input-class instruction
//! gets input-array offset N-1, independent of nesting.

use serde::Deserialize;

/// One element of a UI block, as emitted by the server's JSON descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct UIInstruction {
    pub opcode: UIOpcode,
    /// Control-array offset this instruction was wired to by the builder
    /// that produced it; `None` for group/close/metadata entries, which
    /// never hold a slot of their own.
    pub offset: Option<usize>,
    pub label: String,
    pub meta: Vec<(String, String)>,
    pub init: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// The closed set of UI element kinds the descriptor wire format uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UIOpcode {
    HGroup,
    VGroup,
    TGroup,
    Close,
    VSlider,
    HSlider,
    Checkbox,
    HBarGraph,
    VBarGraph,
    NumericEntry,
    Button,
}

impl UIOpcode {
    fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "hgroup" => UIOpcode::HGroup,
            "vgroup" => UIOpcode::VGroup,
            "tgroup" => UIOpcode::TGroup,
            "close" => UIOpcode::Close,
            "vslider" => UIOpcode::VSlider,
            "hslider" => UIOpcode::HSlider,
            "checkbox" => UIOpcode::Checkbox,
            "hbargraph" => UIOpcode::HBarGraph,
            "vbargraph" => UIOpcode::VBarGraph,
            "nentry" => UIOpcode::NumericEntry,
            "button" => UIOpcode::Button,
            _ => return None,
        })
    }

    /// Input controls occupy the next free slot of the instance's input
    /// array; output controls (bar graphs) occupy the output array; groups
    /// and close markers advance neither counter.
    fn slot_kind(&self) -> SlotKind {
        match self {
            UIOpcode::VSlider
            | UIOpcode::HSlider
            | UIOpcode::Checkbox
            | UIOpcode::NumericEntry
            | UIOpcode::Button => SlotKind::Input,
            UIOpcode::HBarGraph | UIOpcode::VBarGraph => SlotKind::Output,
            UIOpcode::HGroup | UIOpcode::VGroup | UIOpcode::TGroup | UIOpcode::Close => {
                SlotKind::None
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotKind {
    Input,
    Output,
    None,
}

/// An ordered sequence of [`UIInstruction`]s, positionally wired to input
/// and output control slots at construction time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UIBlock {
    instructions: Vec<UIInstruction>,
}

/// The wire shape of a single UI array entry, exactly as the descriptor
/// JSON encodes it.
#[derive(Deserialize)]
struct WireEntry {
    #[serde(rename = "type")]
    kind: String,
    label: String,
    #[serde(default)]
    meta: Vec<[String; 2]>,
    #[serde(default)]
    init: f64,
    #[serde(default)]
    min: f64,
    #[serde(default)]
    max: f64,
    #[serde(default)]
    step: f64,
}

impl UIBlock {
    /// Parse the `ui` array of a JSON descriptor, wiring each control
    /// instruction to the next free input or output slot in order.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let entries: Vec<WireEntry> = serde_json::from_value(value.clone())?;
        let mut next_input = 0usize;
        let mut next_output = 0usize;
        let instructions = entries
            .into_iter()
            .filter_map(|entry| {
                let opcode = UIOpcode::from_wire(&entry.kind)?;
                let offset = match opcode.slot_kind() {
                    SlotKind::Input => {
                        let slot = next_input;
                        next_input += 1;
                        Some(slot)
                    }
                    SlotKind::Output => {
                        let slot = next_output;
                        next_output += 1;
                        Some(slot)
                    }
                    SlotKind::None => None,
                };
                Some(UIInstruction {
                    opcode,
                    offset,
                    label: entry.label,
                    meta: entry
                        .meta
                        .into_iter()
                        .map(|[k, v]| (k, v))
                        .collect(),
                    init: entry.init,
                    min: entry.min,
                    max: entry.max,
                    step: entry.step,
                })
            })
            .collect();
        Ok(UIBlock { instructions })
    }

    pub fn instructions(&self) -> &[UIInstruction] {
        &self.instructions
    }

    /// Number of input-class controls (the size an instance's input
    /// control array must be allocated to), derived from a dry [`build`](Self::build)
    /// drive over a counting builder rather than inspected offsets — this
    /// is the same path `RemoteInstance::create`'s arity sizing goes
    /// through.
    pub fn input_count(&self) -> usize {
        self.counts().0
    }

    /// Number of output-class controls, derived the same way as
    /// [`input_count`](Self::input_count).
    pub fn output_count(&self) -> usize {
        self.counts().1
    }

    fn counts(&self) -> (usize, usize) {
        let mut counter = ControlCounter::default();
        self.build(&mut counter);
        (counter.inputs, counter.outputs)
    }

    /// A textual dump mirroring [`crate::fir::Block::write`]'s format: one
    /// line per instruction, opcode name followed by its label and any
    /// numeric fields. Per spec §4.B, label and metadata strings have
    /// their spaces replaced with underscores and are double-quoted so
    /// the line stays parseable by a field-based tokenizer.
    pub fn write(&self) -> String {
        let mut out = String::new();
        for insn in &self.instructions {
            out.push_str(&format!("{:?} {}", insn.opcode, quote(&insn.label)));
            if let Some(offset) = insn.offset {
                out.push_str(&format!(" [{offset}]"));
            }
            if insn.min != 0.0 || insn.max != 0.0 || insn.step != 0.0 || insn.init != 0.0 {
                out.push_str(&format!(
                    " {} {} {} {}",
                    insn.init, insn.min, insn.max, insn.step
                ));
            }
            out.push('\n');
            for (key, value) in &insn.meta {
                out.push_str(&format!("  meta {} {}\n", quote(key), quote(value)));
            }
        }
        out
    }

    /// Drive `builder` over the block in order. `open_*`/`close` bracket
    /// groups; every control call also carries any metadata attached to it
    /// and, for wired controls, the control-array offset assigned at parse
    /// time.
    pub fn build(&self, builder: &mut dyn UIBuilder) {
        for insn in &self.instructions {
            match insn.opcode {
                UIOpcode::HGroup => builder.open_hgroup(&insn.label),
                UIOpcode::VGroup => builder.open_vgroup(&insn.label),
                UIOpcode::TGroup => builder.open_tgroup(&insn.label),
                UIOpcode::Close => builder.close_group(),
                UIOpcode::VSlider | UIOpcode::HSlider => builder.add_slider(
                    &insn.label,
                    insn.offset.expect("slider without a wired offset"),
                    insn.init,
                    insn.min,
                    insn.max,
                    insn.step,
                ),
                UIOpcode::Checkbox => {
                    builder.add_checkbox(&insn.label, insn.offset.expect("checkbox without offset"))
                }
                UIOpcode::NumericEntry => builder.add_numeric_entry(
                    &insn.label,
                    insn.offset.expect("entry without offset"),
                    insn.init,
                    insn.min,
                    insn.max,
                    insn.step,
                ),
                UIOpcode::Button => {
                    builder.add_button(&insn.label, insn.offset.expect("button without offset"))
                }
                UIOpcode::HBarGraph | UIOpcode::VBarGraph => builder.add_bargraph(
                    &insn.label,
                    insn.offset.expect("bargraph without offset"),
                    insn.min,
                    insn.max,
                ),
            }
            for (key, value) in &insn.meta {
                builder.declare_metadata(&insn.label, key, value);
            }
        }
    }
}

/// Replace spaces with underscores and wrap in double quotes, matching
/// the field-based tokenizer the textual dump is meant to stay parseable
/// by.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace(' ', "_"))
}

/// Side-effecting consumer of a [`UIBlock`], implemented by whatever
/// concrete control surface a caller wires up. A "discarding" builder that
/// implements every method as a no-op is sufficient to just count controls
/// (see [`crate::factory`]'s dry-run use).
pub trait UIBuilder {
    fn open_hgroup(&mut self, label: &str);
    fn open_vgroup(&mut self, label: &str);
    fn open_tgroup(&mut self, label: &str);
    fn close_group(&mut self);
    fn add_slider(&mut self, label: &str, offset: usize, init: f64, min: f64, max: f64, step: f64);
    fn add_checkbox(&mut self, label: &str, offset: usize);
    fn add_numeric_entry(
        &mut self,
        label: &str,
        offset: usize,
        init: f64,
        min: f64,
        max: f64,
        step: f64,
    );
    fn add_button(&mut self, label: &str, offset: usize);
    fn add_bargraph(&mut self, label: &str, offset: usize, min: f64, max: f64);
    fn declare_metadata(&mut self, label: &str, key: &str, value: &str);
}

/// A builder that does nothing. Used to count controls without allocating
/// or touching a real control surface (component F's dry UI build).
#[derive(Default)]
pub struct DiscardingBuilder;

impl UIBuilder for DiscardingBuilder {
    fn open_hgroup(&mut self, _label: &str) {}
    fn open_vgroup(&mut self, _label: &str) {}
    fn open_tgroup(&mut self, _label: &str) {}
    fn close_group(&mut self) {}
    fn add_slider(&mut self, _: &str, _: usize, _: f64, _: f64, _: f64, _: f64) {}
    fn add_checkbox(&mut self, _: &str, _: usize) {}
    fn add_numeric_entry(&mut self, _: &str, _: usize, _: f64, _: f64, _: f64, _: f64) {}
    fn add_button(&mut self, _: &str, _: usize) {}
    fn add_bargraph(&mut self, _: &str, _: usize, _: f64, _: f64) {}
    fn declare_metadata(&mut self, _: &str, _: &str, _: &str) {}
}

/// A builder that tallies the highest input/output offset it's driven
/// over, used by [`UIBlock::input_count`]/[`UIBlock::output_count`] to
/// size an instance's control arrays from the same dry-build path a real
/// control surface would be driven through.
#[derive(Default)]
struct ControlCounter {
    inputs: usize,
    outputs: usize,
}

impl UIBuilder for ControlCounter {
    fn open_hgroup(&mut self, _label: &str) {}
    fn open_vgroup(&mut self, _label: &str) {}
    fn open_tgroup(&mut self, _label: &str) {}
    fn close_group(&mut self) {}
    fn add_slider(&mut self, _: &str, offset: usize, _: f64, _: f64, _: f64, _: f64) {
        self.inputs = self.inputs.max(offset + 1);
    }
    fn add_checkbox(&mut self, _: &str, offset: usize) {
        self.inputs = self.inputs.max(offset + 1);
    }
    fn add_numeric_entry(&mut self, _: &str, offset: usize, _: f64, _: f64, _: f64, _: f64) {
        self.inputs = self.inputs.max(offset + 1);
    }
    fn add_button(&mut self, _: &str, offset: usize) {
        self.inputs = self.inputs.max(offset + 1);
    }
    fn add_bargraph(&mut self, _: &str, offset: usize, _: f64, _: f64) {
        self.outputs = self.outputs.max(offset + 1);
    }
    fn declare_metadata(&mut self, _: &str, _: &str, _: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn group_and_close_consume_no_slots() {
        let value = json!([
            {"type": "vgroup", "label": "main"},
            {"type": "hslider", "label": "gain", "init": 0.5, "min": 0.0, "max": 1.0, "step": 0.01},
            {"type": "close", "label": ""},
        ]);
        let block = UIBlock::from_json(&value).unwrap();
        assert_eq!(block.input_count(), 1);
        assert_eq!(block.output_count(), 0);
        assert_eq!(block.instructions()[1].offset, Some(0));
    }

    #[test]
    fn inputs_and_outputs_are_numbered_independently() {
        let value = json!([
            {"type": "hslider", "label": "a", "init": 0.0, "min": 0.0, "max": 1.0, "step": 0.1},
            {"type": "vbargraph", "label": "out", "min": 0.0, "max": 1.0},
            {"type": "checkbox", "label": "b"},
        ]);
        let block = UIBlock::from_json(&value).unwrap();
        assert_eq!(block.instructions()[0].offset, Some(0));
        assert_eq!(block.instructions()[1].offset, Some(0));
        assert_eq!(block.instructions()[2].offset, Some(1));
    }

    #[test]
    fn unrecognized_wire_entries_are_skipped() {
        let value = json!([
            {"type": "not-a-real-control", "label": "mystery"},
            {"type": "button", "label": "go"},
        ]);
        let block = UIBlock::from_json(&value).unwrap();
        assert_eq!(block.instructions().len(), 1);
    }

    #[test]
    fn write_quotes_and_underscores_labels() {
        let value = json!([
            {"type": "hslider", "label": "input gain", "init": 0.5, "min": 0.0, "max": 1.0, "step": 0.01},
        ]);
        let block = UIBlock::from_json(&value).unwrap();
        let text = block.write();
        assert!(text.contains("\"input_gain\""));
        assert!(!text.contains("input gain"));
    }
}
