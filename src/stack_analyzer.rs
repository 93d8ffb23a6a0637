//! Static stack-depth analysis (component C).
//!
//! A single structural pass over a [`Block`] that tracks two running depths
//! (int, real) and two running peaks, and proves — before any instruction
//! is ever interpreted — that neither operand stack can underflow and that
//! both have a known finite upper bound. This is the soundness witness the
//! rest of the crate leans on: an interpreter that only ever sees bytecode
//! that passed this analysis can allocate its operand stacks once, up
//! front, sized exactly to the reported peaks.

use crate::fir::{BasicInstruction, Block};
use crate::opcode::{Addressing, MathIntrinsic, Opcode};
use crate::error::{BytecodeError, StackKind};

/// Peak depths required to interpret a block, as computed by [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackReport {
    pub int_peak: usize,
    pub real_peak: usize,
}

/// Running state threaded through the traversal. Depths are signed during
/// analysis (a negative depth is the underflow error itself) and converted
/// to the unsigned peaks reported to callers only once a whole block has
/// been shown sound.
#[derive(Default, Clone, Copy)]
struct Cursor {
    int_depth: i64,
    real_depth: i64,
    int_peak: i64,
    real_peak: i64,
}

impl Cursor {
    fn apply(&mut self, int_delta: i64, real_delta: i64, index: usize) -> Result<(), BytecodeError> {
        self.int_depth += int_delta;
        self.real_depth += real_delta;
        if self.int_depth < 0 {
            return Err(BytecodeError::Underflow {
                stack: StackKind::Int,
                index,
            });
        }
        if self.real_depth < 0 {
            return Err(BytecodeError::Underflow {
                stack: StackKind::Real,
                index,
            });
        }
        self.int_peak = self.int_peak.max(self.int_depth);
        self.real_peak = self.real_peak.max(self.real_depth);
        Ok(())
    }
}

/// Analyze a whole program block from an empty pair of stacks and return
/// the peak depths an interpreter must allocate. Fails with
/// [`BytecodeError`] on the first unsound instruction encountered.
pub fn analyze(block: &Block) -> Result<StackReport, BytecodeError> {
    let mut cursor = Cursor::default();
    walk(block, &mut cursor)?;
    Ok(StackReport {
        int_peak: cursor.int_peak as usize,
        real_peak: cursor.real_peak as usize,
    })
}

/// Analyze `block` in isolation, starting both stacks at depth 0. Used for
/// each side of an `If` so the two branches can be compared independently
/// before being folded back into the caller's running state.
fn analyze_isolated(block: &Block) -> Result<Cursor, BytecodeError> {
    let mut cursor = Cursor::default();
    walk(block, &mut cursor)?;
    Ok(cursor)
}

fn walk(block: &Block, cursor: &mut Cursor) -> Result<(), BytecodeError> {
    for (index, insn) in block.instructions().iter().enumerate() {
        step(insn, cursor, index)?;
    }
    Ok(())
}

fn step(insn: &BasicInstruction, cursor: &mut Cursor, index: usize) -> Result<(), BytecodeError> {
    match insn.opcode {
        Opcode::If => {
            // Pop the predicate first.
            cursor.apply(-1, 0, index)?;

            let then_block = insn
                .branch1
                .as_ref()
                .expect("If instruction without a then-branch");
            let else_block = insn
                .branch2
                .as_ref()
                .expect("If instruction without an else-branch");

            let then = analyze_isolated(then_block)?;
            let r#else = analyze_isolated(else_block)?;

            if then.int_depth != r#else.int_depth || then.real_depth != r#else.real_depth {
                return Err(BytecodeError::UnbalancedBranch {
                    then_int: then.int_depth,
                    then_real: then.real_depth,
                    else_int: r#else.int_depth,
                    else_real: r#else.real_depth,
                });
            }

            cursor.int_peak = cursor
                .int_peak
                .max(cursor.int_depth + then.int_peak.max(r#else.int_peak));
            cursor.real_peak = cursor
                .real_peak
                .max(cursor.real_depth + then.real_peak.max(r#else.real_peak));
            cursor.int_depth += then.int_depth;
            cursor.real_depth += then.real_depth;
            Ok(())
        }
        Opcode::Loop => {
            let body = insn.branch1.as_ref().expect("Loop instruction without a body");
            let int_before = cursor.int_depth;
            let real_before = cursor.real_depth;
            walk(body, cursor)?;
            if cursor.int_depth != int_before || cursor.real_depth != real_before {
                return Err(BytecodeError::NonNeutralLoop {
                    int_delta: cursor.int_depth - int_before,
                    real_delta: cursor.real_depth - real_before,
                });
            }
            Ok(())
        }
        other => {
            let (int_delta, real_delta) = effect(&other);
            cursor.apply(int_delta, real_delta, index)
        }
    }
}

/// The per-opcode stack-effect signature: `(int_delta, real_delta)`.
///
/// `If` and `Loop` are handled structurally in [`step`] and never reach
/// here. Every other opcode has a fixed, context-independent effect, which
/// is what makes a single forward pass sufficient.
fn effect(opcode: &Opcode) -> (i64, i64) {
    use Opcode::*;
    match opcode {
        IntValue | LoadInt => (1, 0),
        StoreInt => (-1, 0),
        LoadIndexedInt => (0, 0),
        StoreIndexedInt => (-2, 0),

        RealValue | LoadReal => (0, 1),
        StoreReal => (0, -1),
        LoadIndexedReal => (-1, 1),
        StoreIndexedReal => (-1, -1),

        // The channel index is carried in the instruction's own `offset1`,
        // not pushed onto the int stack first — only the real stack moves.
        LoadInput => (0, 1),
        StoreOutput => (0, -1),

        CastInt => (1, -1),
        CastReal => (-1, 1),
        CastIntHeap => (1, 0),
        CastRealHeap => (0, 1),

        IntArith(_, addr) | IntCompare(_, addr) => match addr {
            Addressing::Stack => (-1, 0),
            Addressing::Heap | Addressing::Direct | Addressing::DirectInvert => (1, 0),
        },

        RealArith(_, addr) => match addr {
            Addressing::Stack => (0, -1),
            Addressing::Heap | Addressing::Direct | Addressing::DirectInvert => (0, 1),
        },

        RealCompare(_, addr) => match addr {
            Addressing::Stack => (1, -2),
            Addressing::Heap | Addressing::Direct | Addressing::DirectInvert => (1, 0),
        },

        Math(kind, addr) => math_effect(*kind, *addr),

        If | Loop => unreachable!("structural opcodes handled in step()"),
    }
}

fn math_effect(kind: MathIntrinsic, addr: Addressing) -> (i64, i64) {
    match kind {
        MathIntrinsic::MaxInt | MathIntrinsic::MinInt => match addr {
            Addressing::Stack => (-1, 0),
            Addressing::Heap | Addressing::Direct | Addressing::DirectInvert => (1, 0),
        },
        MathIntrinsic::MaxReal
        | MathIntrinsic::MinReal
        | MathIntrinsic::Atan2
        | MathIntrinsic::Fmod
        | MathIntrinsic::Pow => match addr {
            Addressing::Stack => (0, -1),
            Addressing::Heap | Addressing::Direct => (0, 1),
            Addressing::DirectInvert => (0, 0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{IntArith, RealArith};

    #[test]
    fn empty_block_has_zero_peaks() {
        let block = Block::new();
        let report = analyze(&block).unwrap();
        assert_eq!(report, StackReport { int_peak: 0, real_peak: 0 });
    }

    #[test]
    fn minimal_passthrough_reports_depth_one() {
        // LoadInput(0) then StoreOutput(0): the channel index lives in each
        // instruction's own offset1, so only the real stack moves.
        let mut block = Block::new();
        block.push(BasicInstruction::simple(Opcode::LoadInput));
        block.push(BasicInstruction::simple(Opcode::StoreOutput));
        let report = analyze(&block).unwrap();
        assert_eq!(report.real_peak, 1);
        assert_eq!(report.int_peak, 0);
    }

    #[test]
    fn store_without_value_underflows() {
        let mut block = Block::new();
        block.push(BasicInstruction::simple(Opcode::StoreInt));
        let err = analyze(&block).unwrap_err();
        assert_eq!(
            err,
            BytecodeError::Underflow {
                stack: StackKind::Int,
                index: 0
            }
        );
    }

    #[test]
    fn balanced_if_is_accepted() {
        let mut then_block = Block::new();
        then_block.push(BasicInstruction::int_value(1));
        let mut else_block = Block::new();
        else_block.push(BasicInstruction::int_value(2));

        let mut block = Block::new();
        block.push(BasicInstruction::int_value(0)); // predicate
        block.push(BasicInstruction::if_then_else(then_block, else_block));
        let report = analyze(&block).unwrap();
        // predicate is popped before either branch runs, so the peak never
        // exceeds depth 1: one for the predicate, one for the pushed value.
        assert_eq!(report.int_peak, 1);
    }

    #[test]
    fn unbalanced_if_is_rejected() {
        let then_block = Block::new();
        let mut else_block = Block::new();
        else_block.push(BasicInstruction::int_value(1));

        let mut block = Block::new();
        block.push(BasicInstruction::int_value(0));
        block.push(BasicInstruction::if_then_else(then_block, else_block));
        let err = analyze(&block).unwrap_err();
        assert!(matches!(err, BytecodeError::UnbalancedBranch { .. }));
    }

    #[test]
    fn neutral_loop_is_accepted() {
        let mut body = Block::new();
        body.push(BasicInstruction::simple(Opcode::LoadInt));
        body.push(BasicInstruction::simple(Opcode::StoreInt));

        let mut block = Block::new();
        block.push(BasicInstruction::simple(Opcode::LoadInt)); // seed one int for the loop to touch
        block.push(BasicInstruction::loop_fixed(4, body));
        let report = analyze(&block).unwrap();
        assert_eq!(report.int_peak, 2);
    }

    #[test]
    fn non_neutral_loop_is_rejected() {
        let mut body = Block::new();
        body.push(BasicInstruction::simple(Opcode::LoadInt));

        let mut block = Block::new();
        block.push(BasicInstruction::loop_fixed(4, body));
        let err = analyze(&block).unwrap_err();
        assert!(matches!(err, BytecodeError::NonNeutralLoop { .. }));
    }

    #[test]
    fn heap_addressed_binary_op_only_pushes() {
        let mut block = Block::new();
        block.push(BasicInstruction::simple(Opcode::IntArith(
            IntArith::Add,
            Addressing::Heap,
        )));
        let report = analyze(&block).unwrap();
        assert_eq!(report.int_peak, 1);
    }

    #[test]
    fn stack_addressed_real_op_requires_two_operands() {
        let mut block = Block::new();
        block.push(BasicInstruction::simple(Opcode::RealArith(
            RealArith::Mult,
            Addressing::Stack,
        )));
        let err = analyze(&block).unwrap_err();
        assert_eq!(
            err,
            BytecodeError::Underflow {
                stack: StackKind::Real,
                index: 0
            }
        );
    }
}
