//! Paired-single instructions (PowerPC 750 SIMD)
//!
//! Arithmetic operates on the {ps0, ps1} views of the FPRs. Quantized
//! loads and stores apply the scale and type selected by the GQR the
//! instruction names. GQR layout: store type in bits 0..2, store scale in
//! bits 8..13, load type in bits 16..18, load scale in bits 24..29;
//! scales are 6-bit signed. Unknown quantization types pass through as
//! IEEE floats.

use crate::instruction::Instruction;
use crate::interpreter::HandlerTable;
use crate::state::ThreadState;
use crate::table::InstructionId;
use ocf_core::bits::sign_extend;
use ocf_core::error::CpuError;
use ocf_memory::Memory;

const QUANTIZE_FLOAT: u32 = 0;
const QUANTIZE_U8: u32 = 4;
const QUANTIZE_U16: u32 = 5;
const QUANTIZE_S8: u32 = 6;
const QUANTIZE_S16: u32 = 7;

#[derive(Clone, Copy)]
struct Quantization {
    ty: u32,
    scale: i32,
}

impl Quantization {
    fn load(gqr: u32) -> Self {
        Self {
            ty: (gqr >> 16) & 0x7,
            scale: sign_extend((gqr >> 24) & 0x3F, 6),
        }
    }

    fn store(gqr: u32) -> Self {
        Self {
            ty: gqr & 0x7,
            scale: sign_extend((gqr >> 8) & 0x3F, 6),
        }
    }

    /// Size in bytes of one quantized element
    fn size(self) -> u32 {
        match self.ty {
            QUANTIZE_U8 | QUANTIZE_S8 => 1,
            QUANTIZE_U16 | QUANTIZE_S16 => 2,
            _ => 4,
        }
    }

    fn dequantize(self, memory: &Memory, ea: u32) -> f32 {
        let raw = match self.ty {
            QUANTIZE_U8 => memory.read::<u8>(ea) as f32,
            QUANTIZE_U16 => memory.read::<u16>(ea) as f32,
            QUANTIZE_S8 => memory.read::<u8>(ea) as i8 as f32,
            QUANTIZE_S16 => memory.read::<u16>(ea) as i16 as f32,
            _ => return memory.read::<f32>(ea),
        };
        raw * (2.0f32).powi(-self.scale)
    }

    fn quantize(self, memory: &Memory, ea: u32, value: f32) {
        let scaled = value * (2.0f32).powi(self.scale);
        match self.ty {
            QUANTIZE_U8 => memory.write::<u8>(ea, scaled.clamp(0.0, u8::MAX as f32) as u8),
            QUANTIZE_U16 => memory.write::<u16>(ea, scaled.clamp(0.0, u16::MAX as f32) as u16),
            QUANTIZE_S8 => {
                memory.write::<u8>(ea, scaled.clamp(i8::MIN as f32, i8::MAX as f32) as i8 as u8)
            }
            QUANTIZE_S16 => memory.write::<u16>(
                ea,
                scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16 as u16,
            ),
            _ => memory.write::<f32>(ea, value),
        }
    }
}

// --- quantized loads and stores ------------------------------------------

fn psq_load(state: &mut ThreadState, instr: Instruction, ea: u32, single: bool, gqr_index: usize) {
    let quant = Quantization::load(state.gqr[gqr_index]);
    let memory = state.memory().clone();

    let ps0 = quant.dequantize(&memory, ea);
    let ps1 = if single {
        1.0
    } else {
        quant.dequantize(&memory, ea.wrapping_add(quant.size()))
    };
    state.fpr[instr.frd()].set_pair(ps0, ps1);
}

fn psq_store(state: &mut ThreadState, instr: Instruction, ea: u32, single: bool, gqr_index: usize) {
    let quant = Quantization::store(state.gqr[gqr_index]);
    let memory = state.memory().clone();
    let fpr = state.fpr[instr.frs()];

    quant.quantize(&memory, ea, fpr.ps0());
    let mut len = quant.size();
    if !single {
        quant.quantize(&memory, ea.wrapping_add(quant.size()), fpr.ps1());
        len *= 2;
    }
    state.notify_store(ea, len);
}

#[inline]
fn ea_q(state: &ThreadState, instr: Instruction) -> u32 {
    let base = if instr.ra() == 0 {
        0
    } else {
        state.gpr[instr.ra()]
    };
    base.wrapping_add(instr.qd() as u32)
}

fn psq_l(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    psq_load(state, instr, ea_q(state, instr), instr.qw(), instr.qi());
    Ok(())
}

fn psq_lu(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    assert!(instr.ra() != 0, "update form with rA == 0");
    let ea = state.gpr[instr.ra()].wrapping_add(instr.qd() as u32);
    psq_load(state, instr, ea, instr.qw(), instr.qi());
    state.gpr[instr.ra()] = ea;
    Ok(())
}

fn psq_lx(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let base = if instr.ra() == 0 {
        0
    } else {
        state.gpr[instr.ra()]
    };
    let ea = base.wrapping_add(state.gpr[instr.rb()]);
    psq_load(state, instr, ea, instr.qwx(), instr.qix());
    Ok(())
}

fn psq_lux(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    assert!(instr.ra() != 0, "update form with rA == 0");
    let ea = state.gpr[instr.ra()].wrapping_add(state.gpr[instr.rb()]);
    psq_load(state, instr, ea, instr.qwx(), instr.qix());
    state.gpr[instr.ra()] = ea;
    Ok(())
}

fn psq_st(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    psq_store(state, instr, ea_q(state, instr), instr.qw(), instr.qi());
    Ok(())
}

fn psq_stu(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    assert!(instr.ra() != 0, "update form with rA == 0");
    let ea = state.gpr[instr.ra()].wrapping_add(instr.qd() as u32);
    psq_store(state, instr, ea, instr.qw(), instr.qi());
    state.gpr[instr.ra()] = ea;
    Ok(())
}

fn psq_stx(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let base = if instr.ra() == 0 {
        0
    } else {
        state.gpr[instr.ra()]
    };
    let ea = base.wrapping_add(state.gpr[instr.rb()]);
    psq_store(state, instr, ea, instr.qwx(), instr.qix());
    Ok(())
}

fn psq_stux(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    assert!(instr.ra() != 0, "update form with rA == 0");
    let ea = state.gpr[instr.ra()].wrapping_add(state.gpr[instr.rb()]);
    psq_store(state, instr, ea, instr.qwx(), instr.qix());
    state.gpr[instr.ra()] = ea;
    Ok(())
}

// --- arithmetic -----------------------------------------------------------

macro_rules! ps_binary {
    ($name:ident, |$a:ident, $b:ident| $expr:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let fa = state.fpr[instr.fra()];
            let fb = state.fpr[instr.frb()];
            let ps0 = {
                let ($a, $b) = (fa.ps0(), fb.ps0());
                $expr
            };
            let ps1 = {
                let ($a, $b) = (fa.ps1(), fb.ps1());
                $expr
            };
            state.fpr[instr.frd()].set_pair(ps0, ps1);
            Ok(())
        }
    };
}

ps_binary!(ps_add, |a, b| a + b);
ps_binary!(ps_sub, |a, b| a - b);
ps_binary!(ps_div, |a, b| a / b);

fn ps_mul(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fa = state.fpr[instr.fra()];
    let fc = state.fpr[instr.frc()];
    state.fpr[instr.frd()].set_pair(fa.ps0() * fc.ps0(), fa.ps1() * fc.ps1());
    Ok(())
}

macro_rules! ps_madd_family {
    ($name:ident, |$p:ident, $b:ident| $expr:expr) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let fa = state.fpr[instr.fra()];
            let fb = state.fpr[instr.frb()];
            let fc = state.fpr[instr.frc()];
            let ps0 = {
                let ($p, $b) = (fa.ps0() * fc.ps0(), fb.ps0());
                $expr
            };
            let ps1 = {
                let ($p, $b) = (fa.ps1() * fc.ps1(), fb.ps1());
                $expr
            };
            state.fpr[instr.frd()].set_pair(ps0, ps1);
            Ok(())
        }
    };
}

ps_madd_family!(ps_madd, |p, b| p + b);
ps_madd_family!(ps_msub, |p, b| p - b);
ps_madd_family!(ps_nmadd, |p, b| -(p + b));
ps_madd_family!(ps_nmsub, |p, b| -(p - b));

fn ps_muls0(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fa = state.fpr[instr.fra()];
    let c0 = state.fpr[instr.frc()].ps0();
    state.fpr[instr.frd()].set_pair(fa.ps0() * c0, fa.ps1() * c0);
    Ok(())
}

fn ps_muls1(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fa = state.fpr[instr.fra()];
    let c1 = state.fpr[instr.frc()].ps1();
    state.fpr[instr.frd()].set_pair(fa.ps0() * c1, fa.ps1() * c1);
    Ok(())
}

fn ps_madds0(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fa = state.fpr[instr.fra()];
    let fb = state.fpr[instr.frb()];
    let c0 = state.fpr[instr.frc()].ps0();
    state
        .fpr[instr.frd()]
        .set_pair(fa.ps0() * c0 + fb.ps0(), fa.ps1() * c0 + fb.ps1());
    Ok(())
}

fn ps_madds1(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fa = state.fpr[instr.fra()];
    let fb = state.fpr[instr.frb()];
    let c1 = state.fpr[instr.frc()].ps1();
    state
        .fpr[instr.frd()]
        .set_pair(fa.ps0() * c1 + fb.ps0(), fa.ps1() * c1 + fb.ps1());
    Ok(())
}

fn ps_sum0(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let sum = state.fpr[instr.fra()].ps0() + state.fpr[instr.frb()].ps1();
    let ps1 = state.fpr[instr.frc()].ps1();
    state.fpr[instr.frd()].set_pair(sum, ps1);
    Ok(())
}

fn ps_sum1(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let sum = state.fpr[instr.fra()].ps0() + state.fpr[instr.frb()].ps1();
    let ps0 = state.fpr[instr.frc()].ps0();
    state.fpr[instr.frd()].set_pair(ps0, sum);
    Ok(())
}

fn ps_neg(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fb = state.fpr[instr.frb()];
    state.fpr[instr.frd()].set_pair(-fb.ps0(), -fb.ps1());
    Ok(())
}

fn ps_mr(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    state.fpr[instr.frd()] = state.fpr[instr.frb()];
    Ok(())
}

fn ps_abs(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fb = state.fpr[instr.frb()];
    state.fpr[instr.frd()].set_pair(fb.ps0().abs(), fb.ps1().abs());
    Ok(())
}

fn ps_nabs(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fb = state.fpr[instr.frb()];
    state.fpr[instr.frd()].set_pair(-fb.ps0().abs(), -fb.ps1().abs());
    Ok(())
}

fn ps_res(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fb = state.fpr[instr.frb()];
    state.fpr[instr.frd()].set_pair(1.0 / fb.ps0(), 1.0 / fb.ps1());
    Ok(())
}

fn ps_rsqrte(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fb = state.fpr[instr.frb()];
    state
        .fpr[instr.frd()]
        .set_pair(1.0 / fb.ps0().sqrt(), 1.0 / fb.ps1().sqrt());
    Ok(())
}

fn ps_sel(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let fa = state.fpr[instr.fra()];
    let fb = state.fpr[instr.frb()];
    let fc = state.fpr[instr.frc()];

    let ps0 = if fa.ps0() >= 0.0 { fc.ps0() } else { fb.ps0() };
    let ps1 = if fa.ps1() >= 0.0 { fc.ps1() } else { fb.ps1() };
    state.fpr[instr.frd()].set_pair(ps0, ps1);
    Ok(())
}

macro_rules! ps_merge {
    ($name:ident, $slot_a:ident, $slot_b:ident) => {
        fn $name(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
            let a = state.fpr[instr.fra()].$slot_a();
            let b = state.fpr[instr.frb()].$slot_b();
            state.fpr[instr.frd()].set_pair(a, b);
            Ok(())
        }
    };
}

ps_merge!(ps_merge00, ps0, ps0);
ps_merge!(ps_merge01, ps0, ps1);
ps_merge!(ps_merge10, ps1, ps0);
ps_merge!(ps_merge11, ps1, ps1);

fn ps_cmp_slot(state: &mut ThreadState, instr: Instruction, a: f32, b: f32) {
    let field = if a.is_nan() || b.is_nan() {
        0b0001
    } else if a < b {
        0b1000
    } else if a > b {
        0b0100
    } else {
        0b0010
    };
    state.set_cr_field(instr.crfd(), field);
}

fn ps_cmpu0(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.fpr[instr.fra()].ps0();
    let b = state.fpr[instr.frb()].ps0();
    ps_cmp_slot(state, instr, a, b);
    Ok(())
}

fn ps_cmpu1(state: &mut ThreadState, instr: Instruction) -> Result<(), CpuError> {
    let a = state.fpr[instr.fra()].ps1();
    let b = state.fpr[instr.frb()].ps1();
    ps_cmp_slot(state, instr, a, b);
    Ok(())
}

pub fn register(table: &mut HandlerTable) {
    use InstructionId as Id;

    table.register(Id::PsAbs, ps_abs);
    table.register(Id::PsAdd, ps_add);
    table.register(Id::PsCmpu0, ps_cmpu0);
    table.register(Id::PsCmpu1, ps_cmpu1);
    table.register(Id::PsDiv, ps_div);
    table.register(Id::PsMadd, ps_madd);
    table.register(Id::PsMadds0, ps_madds0);
    table.register(Id::PsMadds1, ps_madds1);
    table.register(Id::PsMerge00, ps_merge00);
    table.register(Id::PsMerge01, ps_merge01);
    table.register(Id::PsMerge10, ps_merge10);
    table.register(Id::PsMerge11, ps_merge11);
    table.register(Id::PsMr, ps_mr);
    table.register(Id::PsMsub, ps_msub);
    table.register(Id::PsMul, ps_mul);
    table.register(Id::PsMuls0, ps_muls0);
    table.register(Id::PsMuls1, ps_muls1);
    table.register(Id::PsNabs, ps_nabs);
    table.register(Id::PsNeg, ps_neg);
    table.register(Id::PsNmadd, ps_nmadd);
    table.register(Id::PsNmsub, ps_nmsub);
    table.register(Id::PsRes, ps_res);
    table.register(Id::PsRsqrte, ps_rsqrte);
    table.register(Id::PsSel, ps_sel);
    table.register(Id::PsSub, ps_sub);
    table.register(Id::PsSum0, ps_sum0);
    table.register(Id::PsSum1, ps_sum1);
    table.register(Id::PsqL, psq_l);
    table.register(Id::PsqLu, psq_lu);
    table.register(Id::PsqLux, psq_lux);
    table.register(Id::PsqLx, psq_lx);
    table.register(Id::PsqSt, psq_st);
    table.register(Id::PsqStu, psq_stu);
    table.register(Id::PsqStux, psq_stux);
    table.register(Id::PsqStx, psq_stx);
}
