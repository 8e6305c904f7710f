//! Instruction table
//!
//! Maps 32-bit encodings to instruction identities. Entries are keyed by
//! `(mask, value)` pairs grouped into primary-opcode buckets; decoding
//! walks the bucket most-specific-first and returns the first full match.

use crate::instruction::{Field, Instruction};
use once_cell::sync::Lazy;

/// Identity of every implemented Espresso instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum InstructionId {
    // Branch
    B,
    Bc,
    Bcctr,
    Bclr,
    // Condition register
    Crand,
    Crandc,
    Creqv,
    Crnand,
    Crnor,
    Cror,
    Crorc,
    Crxor,
    Mcrf,
    Mfcr,
    Mtcrf,
    // Integer arithmetic
    Add,
    Addc,
    Adde,
    Addi,
    Addic,
    AddicRc,
    Addis,
    Addme,
    Addze,
    Divw,
    Divwu,
    Mulhw,
    Mulhwu,
    Mulli,
    Mullw,
    Neg,
    Subf,
    Subfc,
    Subfe,
    Subfic,
    Subfme,
    Subfze,
    // Integer logical
    And,
    Andc,
    AndiRc,
    AndisRc,
    Cntlzw,
    Eqv,
    Extsb,
    Extsh,
    Nand,
    Nor,
    Or,
    Orc,
    Ori,
    Oris,
    Xor,
    Xori,
    Xoris,
    // Rotate and shift
    Rlwimi,
    Rlwinm,
    Rlwnm,
    Slw,
    Sraw,
    Srawi,
    Srw,
    // Compare
    Cmp,
    Cmpi,
    Cmpl,
    Cmpli,
    // Floating point
    Fabs,
    Fadd,
    Fadds,
    Fcmpo,
    Fcmpu,
    Fctiw,
    Fctiwz,
    Fdiv,
    Fdivs,
    Fmadd,
    Fmadds,
    Fmr,
    Fmsub,
    Fmsubs,
    Fmul,
    Fmuls,
    Fnabs,
    Fneg,
    Fnmadd,
    Fnmadds,
    Fnmsub,
    Fnmsubs,
    Fres,
    Frsp,
    Frsqrte,
    Fsel,
    Fsub,
    Fsubs,
    Mffs,
    Mtfsf,
    // Paired single
    PsAbs,
    PsAdd,
    PsCmpu0,
    PsCmpu1,
    PsDiv,
    PsMadd,
    PsMadds0,
    PsMadds1,
    PsMerge00,
    PsMerge01,
    PsMerge10,
    PsMerge11,
    PsMr,
    PsMsub,
    PsMul,
    PsMuls0,
    PsMuls1,
    PsNabs,
    PsNeg,
    PsNmadd,
    PsNmsub,
    PsRes,
    PsRsqrte,
    PsSel,
    PsSub,
    PsSum0,
    PsSum1,
    PsqL,
    PsqLu,
    PsqLux,
    PsqLx,
    PsqSt,
    PsqStu,
    PsqStux,
    PsqStx,
    // Load and store
    Lbz,
    Lbzu,
    Lbzux,
    Lbzx,
    Lfd,
    Lfdu,
    Lfdux,
    Lfdx,
    Lfs,
    Lfsu,
    Lfsux,
    Lfsx,
    Lha,
    Lhau,
    Lhaux,
    Lhax,
    Lhbrx,
    Lhz,
    Lhzu,
    Lhzux,
    Lhzx,
    Lmw,
    Lswi,
    Lwarx,
    Lwbrx,
    Lwz,
    Lwzu,
    Lwzux,
    Lwzx,
    Stb,
    Stbu,
    Stbux,
    Stbx,
    Stfd,
    Stfdu,
    Stfdux,
    Stfdx,
    Stfiwx,
    Stfs,
    Stfsu,
    Stfsux,
    Stfsx,
    Sth,
    Sthbrx,
    Sthu,
    Sthux,
    Sthx,
    Stmw,
    Stswi,
    Stw,
    Stwbrx,
    Stwcx,
    Stwu,
    Stwux,
    Stwx,
    // System
    Dcbf,
    Dcbi,
    Dcbst,
    Dcbt,
    Dcbtst,
    Dcbz,
    DcbzL,
    Eieio,
    Icbi,
    Isync,
    Mfspr,
    Mftb,
    Mtspr,
    Sync,
    // Kernel call trap; keep last, `COUNT` depends on it
    Kc,
}

/// Number of instruction identities (dense handler tables index by id)
pub const INSTRUCTION_COUNT: usize = InstructionId::Kc as usize + 1;

/// Static description of one instruction
#[derive(Debug, Clone, Copy)]
pub struct InstructionData {
    pub id: InstructionId,
    pub name: &'static str,
    /// Operand fields the instruction reads
    pub read: &'static [Field],
    /// Operand fields the instruction writes
    pub write: &'static [Field],
}

struct Entry {
    mask: u32,
    value: u32,
    data: InstructionData,
}

/// The decode table
pub struct InstructionTable {
    buckets: Vec<Vec<Entry>>,
}

impl InstructionTable {
    /// Decode an instruction word.
    ///
    /// Returns `None` for encodings not in the table.
    pub fn decode(&self, word: u32) -> Option<&InstructionData> {
        let bucket = &self.buckets[(word >> 26) as usize];
        bucket
            .iter()
            .find(|e| word & e.mask == e.value)
            .map(|e| &e.data)
    }

    /// Iterate every entry as `(canonical encoding, data)`.
    ///
    /// The canonical encoding has all operand bits zero.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &InstructionData)> {
        self.buckets
            .iter()
            .flatten()
            .map(|e| (e.value, &e.data))
    }

    fn add(
        &mut self,
        mask: u32,
        value: u32,
        id: InstructionId,
        name: &'static str,
        read: &'static [Field],
        write: &'static [Field],
    ) {
        debug_assert_eq!(value & !mask, 0);
        self.buckets[(value >> 26) as usize].push(Entry {
            mask,
            value,
            data: InstructionData {
                id,
                name,
                read,
                write,
            },
        });
    }

    /// Primary opcode only
    fn op(&mut self, op: u32, id: InstructionId, name: &'static str, r: &'static [Field], w: &'static [Field]) {
        self.add(0x3F << 26, op << 26, id, name, r, w);
    }

    /// 10-bit extended opcode at bit 1 (X/XL/XFX forms; Rc ignored)
    fn xo10(&mut self, op: u32, xo: u32, id: InstructionId, name: &'static str, r: &'static [Field], w: &'static [Field]) {
        self.add(0x3F << 26 | 0x3FF << 1, op << 26 | xo << 1, id, name, r, w);
    }

    /// 10-bit extended opcode with Rc forced set (stwcx.)
    fn xo10_rc(&mut self, op: u32, xo: u32, id: InstructionId, name: &'static str, r: &'static [Field], w: &'static [Field]) {
        self.add(0x3F << 26 | 0x3FF << 1 | 1, op << 26 | xo << 1 | 1, id, name, r, w);
    }

    /// 9-bit extended opcode at bit 1 (XO form; OE and Rc ignored)
    fn xo9(&mut self, op: u32, xo: u32, id: InstructionId, name: &'static str, r: &'static [Field], w: &'static [Field]) {
        self.add(0x3F << 26 | 0x1FF << 1, op << 26 | xo << 1, id, name, r, w);
    }

    /// 6-bit extended opcode at bit 1 (quantized indexed forms)
    fn xo6(&mut self, op: u32, xo: u32, id: InstructionId, name: &'static str, r: &'static [Field], w: &'static [Field]) {
        self.add(0x3F << 26 | 0x3F << 1, op << 26 | xo << 1, id, name, r, w);
    }

    /// 5-bit extended opcode at bit 1 (A form; Rc ignored)
    fn xo5(&mut self, op: u32, xo: u32, id: InstructionId, name: &'static str, r: &'static [Field], w: &'static [Field]) {
        self.add(0x3F << 26 | 0x1F << 1, op << 26 | xo << 1, id, name, r, w);
    }

    fn build() -> Self {
        use Field::*;
        use InstructionId as Id;

        let mut t = Self {
            buckets: (0..64).map(|_| Vec::new()).collect(),
        };

        // Kernel call trap: one reserved primary opcode, payload fields kcn/kci
        t.op(1, Id::Kc, "kc", &[kcn, kci], &[]);

        // Branch
        t.op(18, Id::B, "b", &[li], &[]);
        t.op(16, Id::Bc, "bc", &[bo, bi, bd], &[]);
        t.xo10(19, 16, Id::Bclr, "bclr", &[bo, bi], &[]);
        t.xo10(19, 528, Id::Bcctr, "bcctr", &[bo, bi], &[]);

        // Condition register
        t.xo10(19, 0, Id::Mcrf, "mcrf", &[crfS], &[crfD]);
        t.xo10(19, 33, Id::Crnor, "crnor", &[crbA, crbB], &[crbD]);
        t.xo10(19, 129, Id::Crandc, "crandc", &[crbA, crbB], &[crbD]);
        t.xo10(19, 193, Id::Crxor, "crxor", &[crbA, crbB], &[crbD]);
        t.xo10(19, 225, Id::Crnand, "crnand", &[crbA, crbB], &[crbD]);
        t.xo10(19, 257, Id::Crand, "crand", &[crbA, crbB], &[crbD]);
        t.xo10(19, 289, Id::Creqv, "creqv", &[crbA, crbB], &[crbD]);
        t.xo10(19, 417, Id::Crorc, "crorc", &[crbA, crbB], &[crbD]);
        t.xo10(19, 449, Id::Cror, "cror", &[crbA, crbB], &[crbD]);
        t.xo10(31, 19, Id::Mfcr, "mfcr", &[], &[rD]);
        t.xo10(31, 144, Id::Mtcrf, "mtcrf", &[rS, crm], &[]);

        // Integer arithmetic, D forms
        t.op(7, Id::Mulli, "mulli", &[rA, simm], &[rD]);
        t.op(8, Id::Subfic, "subfic", &[rA, simm], &[rD]);
        t.op(12, Id::Addic, "addic", &[rA, simm], &[rD]);
        t.op(13, Id::AddicRc, "addic.", &[rA, simm], &[rD]);
        t.op(14, Id::Addi, "addi", &[rA, simm], &[rD]);
        t.op(15, Id::Addis, "addis", &[rA, simm], &[rD]);

        // Integer arithmetic, XO forms
        t.xo9(31, 8, Id::Subfc, "subfc", &[rA, rB], &[rD]);
        t.xo9(31, 10, Id::Addc, "addc", &[rA, rB], &[rD]);
        t.xo9(31, 11, Id::Mulhwu, "mulhwu", &[rA, rB], &[rD]);
        t.xo9(31, 40, Id::Subf, "subf", &[rA, rB], &[rD]);
        t.xo9(31, 75, Id::Mulhw, "mulhw", &[rA, rB], &[rD]);
        t.xo9(31, 104, Id::Neg, "neg", &[rA], &[rD]);
        t.xo9(31, 136, Id::Subfe, "subfe", &[rA, rB], &[rD]);
        t.xo9(31, 138, Id::Adde, "adde", &[rA, rB], &[rD]);
        t.xo9(31, 200, Id::Subfze, "subfze", &[rA], &[rD]);
        t.xo9(31, 202, Id::Addze, "addze", &[rA], &[rD]);
        t.xo9(31, 232, Id::Subfme, "subfme", &[rA], &[rD]);
        t.xo9(31, 234, Id::Addme, "addme", &[rA], &[rD]);
        t.xo9(31, 235, Id::Mullw, "mullw", &[rA, rB], &[rD]);
        t.xo9(31, 266, Id::Add, "add", &[rA, rB], &[rD]);
        t.xo9(31, 459, Id::Divwu, "divwu", &[rA, rB], &[rD]);
        t.xo9(31, 491, Id::Divw, "divw", &[rA, rB], &[rD]);

        // Integer logical, D forms
        t.op(24, Id::Ori, "ori", &[rS, uimm], &[rA]);
        t.op(25, Id::Oris, "oris", &[rS, uimm], &[rA]);
        t.op(26, Id::Xori, "xori", &[rS, uimm], &[rA]);
        t.op(27, Id::Xoris, "xoris", &[rS, uimm], &[rA]);
        t.op(28, Id::AndiRc, "andi.", &[rS, uimm], &[rA]);
        t.op(29, Id::AndisRc, "andis.", &[rS, uimm], &[rA]);

        // Integer logical, X forms
        t.xo10(31, 24, Id::Slw, "slw", &[rS, rB], &[rA]);
        t.xo10(31, 26, Id::Cntlzw, "cntlzw", &[rS], &[rA]);
        t.xo10(31, 28, Id::And, "and", &[rS, rB], &[rA]);
        t.xo10(31, 60, Id::Andc, "andc", &[rS, rB], &[rA]);
        t.xo10(31, 124, Id::Nor, "nor", &[rS, rB], &[rA]);
        t.xo10(31, 284, Id::Eqv, "eqv", &[rS, rB], &[rA]);
        t.xo10(31, 316, Id::Xor, "xor", &[rS, rB], &[rA]);
        t.xo10(31, 412, Id::Orc, "orc", &[rS, rB], &[rA]);
        t.xo10(31, 444, Id::Or, "or", &[rS, rB], &[rA]);
        t.xo10(31, 476, Id::Nand, "nand", &[rS, rB], &[rA]);
        t.xo10(31, 536, Id::Srw, "srw", &[rS, rB], &[rA]);
        t.xo10(31, 792, Id::Sraw, "sraw", &[rS, rB], &[rA]);
        t.xo10(31, 824, Id::Srawi, "srawi", &[rS, sh], &[rA]);
        t.xo10(31, 922, Id::Extsh, "extsh", &[rS], &[rA]);
        t.xo10(31, 954, Id::Extsb, "extsb", &[rS], &[rA]);

        // Rotate
        t.op(20, Id::Rlwimi, "rlwimi", &[rS, rA, sh, mb, me], &[rA]);
        t.op(21, Id::Rlwinm, "rlwinm", &[rS, sh, mb, me], &[rA]);
        t.op(23, Id::Rlwnm, "rlwnm", &[rS, rB, mb, me], &[rA]);

        // Compare
        t.op(11, Id::Cmpi, "cmpi", &[rA, simm], &[crfD]);
        t.op(10, Id::Cmpli, "cmpli", &[rA, uimm], &[crfD]);
        t.xo10(31, 0, Id::Cmp, "cmp", &[rA, rB], &[crfD]);
        t.xo10(31, 32, Id::Cmpl, "cmpl", &[rA, rB], &[crfD]);

        // Loads and stores, D forms
        t.op(32, Id::Lwz, "lwz", &[rA, d], &[rD]);
        t.op(33, Id::Lwzu, "lwzu", &[rA, d], &[rD, rA]);
        t.op(34, Id::Lbz, "lbz", &[rA, d], &[rD]);
        t.op(35, Id::Lbzu, "lbzu", &[rA, d], &[rD, rA]);
        t.op(36, Id::Stw, "stw", &[rS, rA, d], &[]);
        t.op(37, Id::Stwu, "stwu", &[rS, rA, d], &[rA]);
        t.op(38, Id::Stb, "stb", &[rS, rA, d], &[]);
        t.op(39, Id::Stbu, "stbu", &[rS, rA, d], &[rA]);
        t.op(40, Id::Lhz, "lhz", &[rA, d], &[rD]);
        t.op(41, Id::Lhzu, "lhzu", &[rA, d], &[rD, rA]);
        t.op(42, Id::Lha, "lha", &[rA, d], &[rD]);
        t.op(43, Id::Lhau, "lhau", &[rA, d], &[rD, rA]);
        t.op(44, Id::Sth, "sth", &[rS, rA, d], &[]);
        t.op(45, Id::Sthu, "sthu", &[rS, rA, d], &[rA]);
        t.op(46, Id::Lmw, "lmw", &[rA, d], &[rD]);
        t.op(47, Id::Stmw, "stmw", &[rS, rA, d], &[]);
        t.op(48, Id::Lfs, "lfs", &[rA, d], &[frD]);
        t.op(49, Id::Lfsu, "lfsu", &[rA, d], &[frD, rA]);
        t.op(50, Id::Lfd, "lfd", &[rA, d], &[frD]);
        t.op(51, Id::Lfdu, "lfdu", &[rA, d], &[frD, rA]);
        t.op(52, Id::Stfs, "stfs", &[frS, rA, d], &[]);
        t.op(53, Id::Stfsu, "stfsu", &[frS, rA, d], &[rA]);
        t.op(54, Id::Stfd, "stfd", &[frS, rA, d], &[]);
        t.op(55, Id::Stfdu, "stfdu", &[frS, rA, d], &[rA]);

        // Loads and stores, X forms
        t.xo10(31, 20, Id::Lwarx, "lwarx", &[rA, rB], &[rD]);
        t.xo10(31, 23, Id::Lwzx, "lwzx", &[rA, rB], &[rD]);
        t.xo10(31, 55, Id::Lwzux, "lwzux", &[rA, rB], &[rD, rA]);
        t.xo10(31, 87, Id::Lbzx, "lbzx", &[rA, rB], &[rD]);
        t.xo10(31, 119, Id::Lbzux, "lbzux", &[rA, rB], &[rD, rA]);
        t.xo10_rc(31, 150, Id::Stwcx, "stwcx.", &[rS, rA, rB], &[crfD]);
        t.xo10(31, 151, Id::Stwx, "stwx", &[rS, rA, rB], &[]);
        t.xo10(31, 183, Id::Stwux, "stwux", &[rS, rA, rB], &[rA]);
        t.xo10(31, 215, Id::Stbx, "stbx", &[rS, rA, rB], &[]);
        t.xo10(31, 247, Id::Stbux, "stbux", &[rS, rA, rB], &[rA]);
        t.xo10(31, 279, Id::Lhzx, "lhzx", &[rA, rB], &[rD]);
        t.xo10(31, 311, Id::Lhzux, "lhzux", &[rA, rB], &[rD, rA]);
        t.xo10(31, 343, Id::Lhax, "lhax", &[rA, rB], &[rD]);
        t.xo10(31, 375, Id::Lhaux, "lhaux", &[rA, rB], &[rD, rA]);
        t.xo10(31, 407, Id::Sthx, "sthx", &[rS, rA, rB], &[]);
        t.xo10(31, 439, Id::Sthux, "sthux", &[rS, rA, rB], &[rA]);
        t.xo10(31, 534, Id::Lwbrx, "lwbrx", &[rA, rB], &[rD]);
        t.xo10(31, 597, Id::Lswi, "lswi", &[rA, nb], &[rD]);
        t.xo10(31, 662, Id::Stwbrx, "stwbrx", &[rS, rA, rB], &[]);
        t.xo10(31, 725, Id::Stswi, "stswi", &[rS, rA, nb], &[]);
        t.xo10(31, 790, Id::Lhbrx, "lhbrx", &[rA, rB], &[rD]);
        t.xo10(31, 918, Id::Sthbrx, "sthbrx", &[rS, rA, rB], &[]);
        t.xo10(31, 535, Id::Lfsx, "lfsx", &[rA, rB], &[frD]);
        t.xo10(31, 567, Id::Lfsux, "lfsux", &[rA, rB], &[frD, rA]);
        t.xo10(31, 599, Id::Lfdx, "lfdx", &[rA, rB], &[frD]);
        t.xo10(31, 631, Id::Lfdux, "lfdux", &[rA, rB], &[frD, rA]);
        t.xo10(31, 663, Id::Stfsx, "stfsx", &[frS, rA, rB], &[]);
        t.xo10(31, 695, Id::Stfsux, "stfsux", &[frS, rA, rB], &[rA]);
        t.xo10(31, 727, Id::Stfdx, "stfdx", &[frS, rA, rB], &[]);
        t.xo10(31, 759, Id::Stfdux, "stfdux", &[frS, rA, rB], &[rA]);
        t.xo10(31, 983, Id::Stfiwx, "stfiwx", &[frS, rA, rB], &[]);

        // Floating point, opcode 59 (single precision)
        t.xo5(59, 18, Id::Fdivs, "fdivs", &[frA, frB], &[frD]);
        t.xo5(59, 20, Id::Fsubs, "fsubs", &[frA, frB], &[frD]);
        t.xo5(59, 21, Id::Fadds, "fadds", &[frA, frB], &[frD]);
        t.xo5(59, 24, Id::Fres, "fres", &[frB], &[frD]);
        t.xo5(59, 25, Id::Fmuls, "fmuls", &[frA, frC], &[frD]);
        t.xo5(59, 28, Id::Fmsubs, "fmsubs", &[frA, frB, frC], &[frD]);
        t.xo5(59, 29, Id::Fmadds, "fmadds", &[frA, frB, frC], &[frD]);
        t.xo5(59, 30, Id::Fnmsubs, "fnmsubs", &[frA, frB, frC], &[frD]);
        t.xo5(59, 31, Id::Fnmadds, "fnmadds", &[frA, frB, frC], &[frD]);

        // Floating point, opcode 63: X forms first (more specific)
        t.xo10(63, 0, Id::Fcmpu, "fcmpu", &[frA, frB], &[crfD]);
        t.xo10(63, 12, Id::Frsp, "frsp", &[frB], &[frD]);
        t.xo10(63, 14, Id::Fctiw, "fctiw", &[frB], &[frD]);
        t.xo10(63, 15, Id::Fctiwz, "fctiwz", &[frB], &[frD]);
        t.xo10(63, 32, Id::Fcmpo, "fcmpo", &[frA, frB], &[crfD]);
        t.xo10(63, 40, Id::Fneg, "fneg", &[frB], &[frD]);
        t.xo10(63, 72, Id::Fmr, "fmr", &[frB], &[frD]);
        t.xo10(63, 136, Id::Fnabs, "fnabs", &[frB], &[frD]);
        t.xo10(63, 264, Id::Fabs, "fabs", &[frB], &[frD]);
        t.xo10(63, 583, Id::Mffs, "mffs", &[], &[frD]);
        t.xo10(63, 711, Id::Mtfsf, "mtfsf", &[fm, frB], &[]);
        // A forms
        t.xo5(63, 18, Id::Fdiv, "fdiv", &[frA, frB], &[frD]);
        t.xo5(63, 20, Id::Fsub, "fsub", &[frA, frB], &[frD]);
        t.xo5(63, 21, Id::Fadd, "fadd", &[frA, frB], &[frD]);
        t.xo5(63, 23, Id::Fsel, "fsel", &[frA, frB, frC], &[frD]);
        t.xo5(63, 25, Id::Fmul, "fmul", &[frA, frC], &[frD]);
        t.xo5(63, 26, Id::Frsqrte, "frsqrte", &[frB], &[frD]);
        t.xo5(63, 28, Id::Fmsub, "fmsub", &[frA, frB, frC], &[frD]);
        t.xo5(63, 29, Id::Fmadd, "fmadd", &[frA, frB, frC], &[frD]);
        t.xo5(63, 30, Id::Fnmsub, "fnmsub", &[frA, frB, frC], &[frD]);
        t.xo5(63, 31, Id::Fnmadd, "fnmadd", &[frA, frB, frC], &[frD]);

        // Paired single, opcode 4: X forms first
        t.xo10(4, 0, Id::PsCmpu0, "ps_cmpu0", &[frA, frB], &[crfD]);
        t.xo10(4, 40, Id::PsNeg, "ps_neg", &[frB], &[frD]);
        t.xo10(4, 64, Id::PsCmpu1, "ps_cmpu1", &[frA, frB], &[crfD]);
        t.xo10(4, 72, Id::PsMr, "ps_mr", &[frB], &[frD]);
        t.xo10(4, 136, Id::PsNabs, "ps_nabs", &[frB], &[frD]);
        t.xo10(4, 264, Id::PsAbs, "ps_abs", &[frB], &[frD]);
        t.xo10(4, 528, Id::PsMerge00, "ps_merge00", &[frA, frB], &[frD]);
        t.xo10(4, 560, Id::PsMerge01, "ps_merge01", &[frA, frB], &[frD]);
        t.xo10(4, 592, Id::PsMerge10, "ps_merge10", &[frA, frB], &[frD]);
        t.xo10(4, 624, Id::PsMerge11, "ps_merge11", &[frA, frB], &[frD]);
        t.xo10(4, 1014, Id::DcbzL, "dcbz_l", &[rA, rB], &[]);
        // Quantized indexed forms (6-bit extended opcode)
        t.xo6(4, 6, Id::PsqLx, "psq_lx", &[rA, rB, qi, qw], &[frD]);
        t.xo6(4, 7, Id::PsqStx, "psq_stx", &[frS, rA, rB, qi, qw], &[]);
        t.xo6(4, 38, Id::PsqLux, "psq_lux", &[rA, rB, qi, qw], &[frD, rA]);
        t.xo6(4, 39, Id::PsqStux, "psq_stux", &[frS, rA, rB, qi, qw], &[rA]);
        // A forms
        t.xo5(4, 10, Id::PsSum0, "ps_sum0", &[frA, frB, frC], &[frD]);
        t.xo5(4, 11, Id::PsSum1, "ps_sum1", &[frA, frB, frC], &[frD]);
        t.xo5(4, 12, Id::PsMuls0, "ps_muls0", &[frA, frC], &[frD]);
        t.xo5(4, 13, Id::PsMuls1, "ps_muls1", &[frA, frC], &[frD]);
        t.xo5(4, 14, Id::PsMadds0, "ps_madds0", &[frA, frB, frC], &[frD]);
        t.xo5(4, 15, Id::PsMadds1, "ps_madds1", &[frA, frB, frC], &[frD]);
        t.xo5(4, 18, Id::PsDiv, "ps_div", &[frA, frB], &[frD]);
        t.xo5(4, 20, Id::PsSub, "ps_sub", &[frA, frB], &[frD]);
        t.xo5(4, 21, Id::PsAdd, "ps_add", &[frA, frB], &[frD]);
        t.xo5(4, 23, Id::PsSel, "ps_sel", &[frA, frB, frC], &[frD]);
        t.xo5(4, 24, Id::PsRes, "ps_res", &[frB], &[frD]);
        t.xo5(4, 25, Id::PsMul, "ps_mul", &[frA, frC], &[frD]);
        t.xo5(4, 26, Id::PsRsqrte, "ps_rsqrte", &[frB], &[frD]);
        t.xo5(4, 28, Id::PsMsub, "ps_msub", &[frA, frB, frC], &[frD]);
        t.xo5(4, 29, Id::PsMadd, "ps_madd", &[frA, frB, frC], &[frD]);
        t.xo5(4, 30, Id::PsNmsub, "ps_nmsub", &[frA, frB, frC], &[frD]);
        t.xo5(4, 31, Id::PsNmadd, "ps_nmadd", &[frA, frB, frC], &[frD]);

        // Quantized displacement forms
        t.op(56, Id::PsqL, "psq_l", &[rA, d, qi, qw], &[frD]);
        t.op(57, Id::PsqLu, "psq_lu", &[rA, d, qi, qw], &[frD, rA]);
        t.op(60, Id::PsqSt, "psq_st", &[frS, rA, d, qi, qw], &[]);
        t.op(61, Id::PsqStu, "psq_stu", &[frS, rA, d, qi, qw], &[rA]);

        // System
        t.xo10(19, 150, Id::Isync, "isync", &[], &[]);
        t.xo10(31, 54, Id::Dcbst, "dcbst", &[rA, rB], &[]);
        t.xo10(31, 86, Id::Dcbf, "dcbf", &[rA, rB], &[]);
        t.xo10(31, 246, Id::Dcbtst, "dcbtst", &[rA, rB], &[]);
        t.xo10(31, 278, Id::Dcbt, "dcbt", &[rA, rB], &[]);
        t.xo10(31, 339, Id::Mfspr, "mfspr", &[spr], &[rD]);
        t.xo10(31, 371, Id::Mftb, "mftb", &[spr], &[rD]);
        t.xo10(31, 467, Id::Mtspr, "mtspr", &[rS, spr], &[]);
        t.xo10(31, 470, Id::Dcbi, "dcbi", &[rA, rB], &[]);
        t.xo10(31, 598, Id::Sync, "sync", &[], &[]);
        t.xo10(31, 854, Id::Eieio, "eieio", &[], &[]);
        t.xo10(31, 982, Id::Icbi, "icbi", &[rA, rB], &[]);
        t.xo10(31, 1014, Id::Dcbz, "dcbz", &[rA, rB], &[]);

        // Most-specific entries first within each bucket
        for bucket in &mut t.buckets {
            bucket.sort_by_key(|e| std::cmp::Reverse(e.mask.count_ones()));
        }

        t
    }
}

static TABLE: Lazy<InstructionTable> = Lazy::new(InstructionTable::build);

/// The process-wide instruction table (built on first use)
pub fn instruction_table() -> &'static InstructionTable {
    &TABLE
}

/// Architectural SPR numbers routed by mfspr/mtspr
pub mod spr {
    pub const XER: u32 = 1;
    pub const LR: u32 = 8;
    pub const CTR: u32 = 9;
    pub const TBL: u32 = 268;
    pub const TBU: u32 = 269;
    pub const GQR0: u32 = 912;
    pub const GQR7: u32 = 919;
}

/// Assemble the architectural SPR number from the instruction's raw field.
///
/// The encoding stores the 10-bit number with its 5-bit halves swapped.
#[inline]
pub fn decode_spr(instr: Instruction) -> u32 {
    let raw = instr.spr();
    ((raw << 5) & 0x3E0) | ((raw >> 5) & 0x1F)
}

/// Inverse of [`decode_spr`]: raw field value for an SPR number.
#[inline]
pub fn encode_spr(spr: u32) -> u32 {
    ((spr & 0x1F) << 5) | ((spr >> 5) & 0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_encodings() {
        let table = instruction_table();

        // addi r3, r0, 42
        assert_eq!(table.decode(0x3860_002A).unwrap().id, InstructionId::Addi);
        // b
        assert_eq!(table.decode(0x4800_0100).unwrap().id, InstructionId::B);
        // add r5, r3, r4 -> 31, rD=5 rA=3 rB=4, xo=266
        let word = (31 << 26) | (5 << 21) | (3 << 16) | (4 << 11) | (266 << 1);
        assert_eq!(table.decode(word).unwrap().id, InstructionId::Add);
        // add. with Rc and OE still decodes as add
        assert_eq!(table.decode(word | 1 | (1 << 10)).unwrap().id, InstructionId::Add);
    }

    #[test]
    fn test_canonical_roundtrip() {
        // Every entry's canonical encoding decodes back to its own id
        let table = instruction_table();
        for (encoding, data) in table.entries() {
            let decoded = table.decode(encoding).unwrap_or_else(|| {
                panic!("canonical encoding of {} failed to decode", data.name)
            });
            assert_eq!(decoded.id, data.id, "mismatch for {}", data.name);
        }
    }

    #[test]
    fn test_unknown_primary_opcode() {
        let table = instruction_table();
        // Primary opcodes 2, 3, 5 are not in the table
        assert!(table.decode(2 << 26).is_none());
        assert!(table.decode(3 << 26).is_none());
        assert!(table.decode(5 << 26).is_none());
        // All-zero word (primary 0) is not an instruction
        assert!(table.decode(0).is_none());
    }

    #[test]
    fn test_unknown_extended_opcode() {
        let table = instruction_table();
        // Opcode 31 with an unused extended opcode
        assert!(table.decode((31 << 26) | (1023 << 1)).is_none());
    }

    #[test]
    fn test_stwcx_requires_rc() {
        let table = instruction_table();
        let base = (31 << 26) | (150 << 1);
        assert_eq!(table.decode(base | 1).unwrap().id, InstructionId::Stwcx);
        // Without Rc this bit pattern is not stwcx. (nor anything else)
        assert!(table.decode(base).is_none());
    }

    #[test]
    fn test_spr_decode() {
        // mfspr rD, LR: raw field 0x100
        let word = (31 << 26) | (0x100 << 11) | (339 << 1);
        assert_eq!(decode_spr(Instruction(word)), spr::LR);

        // CTR: raw field 0x120
        let word = (31 << 26) | (0x120 << 11) | (339 << 1);
        assert_eq!(decode_spr(Instruction(word)), spr::CTR);

        // XER: raw field 0x20
        let word = (31 << 26) | (0x20 << 11) | (339 << 1);
        assert_eq!(decode_spr(Instruction(word)), spr::XER);

        // GQR0..GQR7 are 912..919
        for i in 0..8 {
            let raw = encode_spr(spr::GQR0 + i);
            let word = (31 << 26) | (raw << 11) | (339 << 1);
            assert_eq!(decode_spr(Instruction(word)), spr::GQR0 + i);
        }
    }

    #[test]
    fn test_spr_encode_decode_roundtrip() {
        for n in [spr::XER, spr::LR, spr::CTR, spr::TBL, spr::TBU, spr::GQR0, spr::GQR7] {
            let raw = encode_spr(n);
            let word = (31 << 26) | (raw << 11) | (339 << 1);
            assert_eq!(decode_spr(Instruction(word)), n);
        }
    }

    #[test]
    fn test_kc_payload() {
        let table = instruction_table();
        let word = (1 << 26) | (7 << 1) | 1;
        let data = table.decode(word).unwrap();
        assert_eq!(data.id, InstructionId::Kc);
        assert_eq!(Instruction(word).kcn(), 7);
        assert!(Instruction(word).kci());
    }

    #[test]
    fn test_instruction_count_covers_ids() {
        assert_eq!(INSTRUCTION_COUNT, InstructionId::Kc as usize + 1);
        assert!(INSTRUCTION_COUNT > 150);
    }
}
