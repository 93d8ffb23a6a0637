//! The FIR opcode catalogue (component A).
//!
//! A single closed enumeration: no opcode is ever constructed at runtime
//! from anything other than these variants, and adding one means extending
//! both this file and the stack-effect table in [`crate::stack_analyzer`].
//!
//! The four addressing families (stack / heap / direct / direct-invert)
//! recur across nearly every binary operator, so rather than flattening
//! ~150 near-identical variants the way the original C interpreter's opcode
//! table does, operators and addressing are split into their own small
//! enums and combined. The set of representable `Opcode` values is still
//! finite and closed; this is just how that closed set is spelled in Rust.

use std::fmt;

/// Where a binary operator's operands come from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// Both operands already on the stack.
    Stack,
    /// One operand from a heap cell (`offset2`), the other from the stack.
    Heap,
    /// Both operands are immediates/offsets; `offset1` is a literal index
    /// and `offset2` a heap address.
    Direct,
    /// As `Direct`, but with operand order reversed. Only meaningful for
    /// non-commutative operators.
    DirectInvert,
}

/// Integer arithmetic and bitwise operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntArith {
    Add,
    Sub,
    Mult,
    Div,
    Rem,
    Lsh,
    Rsh,
    And,
    Or,
    Xor,
}

/// Integer relational operators (produce an int-typed boolean).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntCompare {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

/// Real (floating-point) arithmetic operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RealArith {
    Add,
    Sub,
    Mult,
    Div,
    Rem,
}

/// Real relational operators (produce an int-typed boolean).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RealCompare {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

/// Math intrinsics. `Atan2`/`Fmod`/`Pow` are two-argument transcendentals and
/// are the only ones with a `DirectInvert` addressing; `Max`/`Min` are
/// commutative and split into int/real domains, matching the original
/// `kMax`/`kMaxf`/`kMin`/`kMinf` split.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MathIntrinsic {
    Atan2,
    Fmod,
    Pow,
    MaxInt,
    MinInt,
    MaxReal,
    MinReal,
}

/// The full opcode catalogue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    IntValue,
    RealValue,

    LoadInt,
    StoreInt,
    LoadIndexedInt,
    StoreIndexedInt,

    LoadReal,
    StoreReal,
    LoadIndexedReal,
    StoreIndexedReal,

    LoadInput,
    StoreOutput,

    CastInt,
    CastReal,
    CastIntHeap,
    CastRealHeap,

    IntArith(IntArith, Addressing),
    IntCompare(IntCompare, Addressing),
    RealArith(RealArith, Addressing),
    RealCompare(RealCompare, Addressing),
    Math(MathIntrinsic, Addressing),

    /// Structured `if`; children carried on the owning `BasicInstruction`.
    If,
    /// Structured `loop`; child carried on the owning `BasicInstruction`.
    Loop,
}

impl Opcode {
    /// Textual name used by [`crate::fir::Block::write`] and diagnostics.
    /// Kept in lock-step with the enumeration above: this is the "parallel
    /// table of textual names" the opcode catalogue is specified to carry.
    pub fn name(&self) -> String {
        use Opcode::*;
        match self {
            IntValue => "IntValue".into(),
            RealValue => "RealValue".into(),
            LoadInt => "LoadInt".into(),
            StoreInt => "StoreInt".into(),
            LoadIndexedInt => "LoadIndexedInt".into(),
            StoreIndexedInt => "StoreIndexedInt".into(),
            LoadReal => "LoadReal".into(),
            StoreReal => "StoreReal".into(),
            LoadIndexedReal => "LoadIndexedReal".into(),
            StoreIndexedReal => "StoreIndexedReal".into(),
            LoadInput => "LoadInput".into(),
            StoreOutput => "StoreOutput".into(),
            CastInt => "CastInt".into(),
            CastReal => "CastReal".into(),
            CastIntHeap => "CastIntHeap".into(),
            CastRealHeap => "CastRealHeap".into(),
            IntArith(op, addr) => format!("Int{op:?}{}", addr.suffix()),
            IntCompare(op, addr) => format!("Int{op:?}{}", addr.suffix()),
            RealArith(op, addr) => format!("Real{op:?}{}", addr.suffix()),
            RealCompare(op, addr) => format!("Real{op:?}{}", addr.suffix()),
            Math(op, addr) => format!("{op:?}{}", addr.suffix()),
            If => "If".into(),
            Loop => "Loop".into(),
        }
    }
}

impl Addressing {
    fn suffix(&self) -> &'static str {
        match self {
            Addressing::Stack => "",
            Addressing::Heap => "Heap",
            Addressing::Direct => "Direct",
            Addressing::DirectInvert => "DirectInvert",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
