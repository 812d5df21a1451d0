use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use lockstep_types::{Fencing, NativeInt, RmwOp, Width};

/// Hardware-backed cell: the same contract as [`crate::MemoryCell`],
/// executed with `std::sync::atomic` primitives behind `&self` methods.
///
/// This is the executor the concurrency tests race on. `Fencing::Fenced`
/// maps to sequentially-consistent orderings, `Fencing::Unfenced` to
/// relaxed ones; both keep every operation indivisible.
pub struct SharedCell {
    storage: Storage,
}

enum Storage {
    W8(AtomicU8),
    W16(AtomicU16),
    W32(AtomicU32),
    W64(AtomicU64),
}

fn order(fencing: Fencing) -> Ordering {
    match fencing {
        Fencing::Fenced => Ordering::SeqCst,
        Fencing::Unfenced => Ordering::Relaxed,
    }
}

impl SharedCell {
    pub fn new(width: Width, initial: u64) -> Self {
        let initial = width.truncate(initial);
        let storage = match width {
            Width::W8 => Storage::W8(AtomicU8::new(initial as u8)),
            Width::W16 => Storage::W16(AtomicU16::new(initial as u16)),
            Width::W32 => Storage::W32(AtomicU32::new(initial as u32)),
            Width::W64 => Storage::W64(AtomicU64::new(initial)),
        };
        SharedCell { storage }
    }

    pub fn of<T: NativeInt>(value: T) -> Self {
        SharedCell::new(T::WIDTH, value.to_bits())
    }

    pub fn width(&self) -> Width {
        match self.storage {
            Storage::W8(_) => Width::W8,
            Storage::W16(_) => Width::W16,
            Storage::W32(_) => Width::W32,
            Storage::W64(_) => Width::W64,
        }
    }

    pub fn load(&self) -> u64 {
        match &self.storage {
            Storage::W8(c) => c.load(Ordering::SeqCst) as u64,
            Storage::W16(c) => c.load(Ordering::SeqCst) as u64,
            Storage::W32(c) => c.load(Ordering::SeqCst) as u64,
            Storage::W64(c) => c.load(Ordering::SeqCst),
        }
    }

    /// Strong compare-and-swap: returns the pre-call value whether or not
    /// it swapped. Operands are truncated to the cell width.
    pub fn strong_cas(&self, expected: u64, replacement: u64, fencing: Fencing) -> u64 {
        let ord = order(fencing);
        match &self.storage {
            Storage::W8(c) => {
                match c.compare_exchange(expected as u8, replacement as u8, ord, ord) {
                    Ok(prev) | Err(prev) => prev as u64,
                }
            }
            Storage::W16(c) => {
                match c.compare_exchange(expected as u16, replacement as u16, ord, ord) {
                    Ok(prev) | Err(prev) => prev as u64,
                }
            }
            Storage::W32(c) => {
                match c.compare_exchange(expected as u32, replacement as u32, ord, ord) {
                    Ok(prev) | Err(prev) => prev as u64,
                }
            }
            Storage::W64(c) => match c.compare_exchange(expected, replacement, ord, ord) {
                Ok(prev) | Err(prev) => prev,
            },
        }
    }

    /// Weak compare-and-swap: success flag only. May fail spuriously even
    /// on a matching value; callers that need progress retry in a loop.
    pub fn weak_cas(&self, expected: u64, replacement: u64, fencing: Fencing) -> bool {
        let ord = order(fencing);
        match &self.storage {
            Storage::W8(c) => c
                .compare_exchange_weak(expected as u8, replacement as u8, ord, ord)
                .is_ok(),
            Storage::W16(c) => c
                .compare_exchange_weak(expected as u16, replacement as u16, ord, ord)
                .is_ok(),
            Storage::W32(c) => c
                .compare_exchange_weak(expected as u32, replacement as u32, ord, ord)
                .is_ok(),
            Storage::W64(c) => c
                .compare_exchange_weak(expected, replacement, ord, ord)
                .is_ok(),
        }
    }

    /// Atomic read-modify-write; returns the pre-update value.
    pub fn rmw(&self, op: RmwOp, operand: u64, fencing: Fencing) -> u64 {
        let ord = order(fencing);
        match &self.storage {
            Storage::W8(c) => {
                let v = operand as u8;
                let prev = match op {
                    RmwOp::Add => c.fetch_add(v, ord),
                    RmwOp::Sub => c.fetch_sub(v, ord),
                    RmwOp::And => c.fetch_and(v, ord),
                    RmwOp::Or => c.fetch_or(v, ord),
                    RmwOp::Xor => c.fetch_xor(v, ord),
                    RmwOp::Xchg => c.swap(v, ord),
                };
                prev as u64
            }
            Storage::W16(c) => {
                let v = operand as u16;
                let prev = match op {
                    RmwOp::Add => c.fetch_add(v, ord),
                    RmwOp::Sub => c.fetch_sub(v, ord),
                    RmwOp::And => c.fetch_and(v, ord),
                    RmwOp::Or => c.fetch_or(v, ord),
                    RmwOp::Xor => c.fetch_xor(v, ord),
                    RmwOp::Xchg => c.swap(v, ord),
                };
                prev as u64
            }
            Storage::W32(c) => {
                let v = operand as u32;
                let prev = match op {
                    RmwOp::Add => c.fetch_add(v, ord),
                    RmwOp::Sub => c.fetch_sub(v, ord),
                    RmwOp::And => c.fetch_and(v, ord),
                    RmwOp::Or => c.fetch_or(v, ord),
                    RmwOp::Xor => c.fetch_xor(v, ord),
                    RmwOp::Xchg => c.swap(v, ord),
                };
                prev as u64
            }
            Storage::W64(c) => match op {
                RmwOp::Add => c.fetch_add(operand, ord),
                RmwOp::Sub => c.fetch_sub(operand, ord),
                RmwOp::And => c.fetch_and(operand, ord),
                RmwOp::Or => c.fetch_or(operand, ord),
                RmwOp::Xor => c.fetch_xor(operand, ord),
                RmwOp::Xchg => c.swap(operand, ord),
            },
        }
    }

    /// Closure-shaped read-modify-write, retried until the compare-exchange
    /// commits. `f` may run more than once and must be pure.
    pub fn atomic_rmw<R>(&self, fencing: Fencing, mut f: impl FnMut(u64) -> (u64, R)) -> R {
        loop {
            let old = self.load();
            let (new, ret) = f(old);
            if self.strong_cas(old, new, fencing) == old {
                return ret;
            }
        }
    }
}
