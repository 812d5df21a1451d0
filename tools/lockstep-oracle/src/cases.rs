//! The oracle's case matrix: one named case per (scenario, width) or
//! (isa, op, fencing) combination, so a substring filter can select any
//! slice of the suite.

use std::thread;

use anyhow::{ensure, Result};
use lockstep_model::{rmw_result, MemoryCell, SharedCell};
use lockstep_types::{AtomicOp, Fencing, NativeInt, RmwOp, TargetIsa, Width};
use lockstep_verify::{verify_atomic, Compilation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub threads: usize,
    pub iters: usize,
    pub seed: u64,
    pub sweep_cases: usize,
}

pub struct Case {
    pub name: String,
    pub run: Box<dyn Fn() -> Result<()>>,
}

fn push(cases: &mut Vec<Case>, name: String, run: impl Fn() -> Result<()> + 'static) {
    cases.push(Case {
        name,
        run: Box::new(run),
    });
}

pub fn build(config: Config) -> Vec<Case> {
    let mut cases = Vec::new();

    for w in Width::ALL {
        push(&mut cases, format!("weak_cas_{w}"), move || {
            weak_cas_scenario(w)
        });
        push(&mut cases, format!("strong_cas_{w}"), move || {
            strong_cas_scenario(w)
        });
        push(&mut cases, format!("strong_cas_truncation_{w}"), move || {
            truncation_scenario(w)
        });
        for op in RmwOp::ALL {
            push(&mut cases, format!("xchg_{op:?}_{w}").to_lowercase(), move || {
                rmw_scenario(w, op)
            });
        }
        push(&mut cases, format!("differential_sweep_{w}"), move || {
            differential_sweep(w, config.seed, config.sweep_cases)
        });
    }

    push(&mut cases, "strong_cas_canonical_w8".into(), canonical_scenario::<i8>);
    push(&mut cases, "strong_cas_canonical_w16".into(), canonical_scenario::<i16>);
    push(&mut cases, "strong_cas_canonical_w32".into(), canonical_scenario::<i32>);
    push(&mut cases, "strong_cas_canonical_w64".into(), canonical_scenario::<i64>);

    for isa in [
        TargetIsa::X86_64,
        TargetIsa::Aarch64 { lse: true },
        TargetIsa::Aarch64 { lse: false },
        TargetIsa::Arm32Thumb2,
    ] {
        for op in AtomicOp::ALL {
            for fencing in [Fencing::Fenced, Fencing::Unfenced] {
                let suffix = match fencing {
                    Fencing::Fenced => "fenced",
                    Fencing::Unfenced => "unfenced",
                };
                push(&mut cases, format!("codegen_{isa}_{op}_{suffix}"), move || {
                    verify_atomic(&reference_compilation(isa, op, fencing), op, fencing)?;
                    Ok(())
                });
            }
        }
    }

    push(&mut cases, "stress_fetch_add_unique_priors".into(), move || {
        stress_fetch_add(config)
    });
    push(&mut cases, "stress_xchg_token_conservation".into(), move || {
        stress_xchg_tokens(config)
    });
    push(&mut cases, "stress_weak_cas_claims".into(), move || {
        stress_weak_cas_claims(config)
    });

    cases
}

fn weak_cas_scenario(width: Width) -> Result<()> {
    // Matching cell: the retry loop must terminate and install the
    // replacement.
    let cell = SharedCell::new(width, 42);
    while !cell.weak_cas(42, 0xbeef, Fencing::Fenced) {}
    ensure!(cell.load() == width.truncate(0xbeef), "replacement installed");

    // Non-matching cell: the flag is false and the cell is untouched.
    let stale = width.truncate(300);
    let cell = SharedCell::new(width, stale);
    ensure!(!cell.weak_cas(42, 0xbeef, Fencing::Fenced), "no spurious success");
    ensure!(cell.load() == stale, "failed CAS must not write");

    // The reference model agrees on both outcomes.
    let mut model = MemoryCell::new(width, 42);
    ensure!(model.weak_cas(42, 0xbeef), "model success");
    let mut model = MemoryCell::new(width, stale);
    ensure!(!model.weak_cas(42, 0xbeef), "model failure");
    Ok(())
}

fn strong_cas_scenario(width: Width) -> Result<()> {
    let beef = width.truncate(0xbeef);
    for fencing in [Fencing::Fenced, Fencing::Unfenced] {
        let shared = SharedCell::new(width, 42);
        ensure!(shared.strong_cas(42, 0xbeef, fencing) == 42, "prior on match");
        ensure!(shared.load() == beef, "swap installed");
        ensure!(shared.strong_cas(42, 0xbeef, fencing) == beef, "prior on mismatch");
        ensure!(shared.load() == beef, "mismatch leaves cell");
    }

    let mut model = MemoryCell::new(width, 42);
    ensure!(model.strong_cas(42, 0xbeef) == 42, "model prior on match");
    ensure!(model.strong_cas(42, 0xbeef) == beef, "model prior on mismatch");
    ensure!(model.load() == beef, "model final value");
    Ok(())
}

fn truncation_scenario(width: Width) -> Result<()> {
    // A wide expected constant only matches through its truncated low bits.
    let wide = 0x0f00_0000_0000_0000u64 + 42;
    let mut model = MemoryCell::new(width, 42);
    let prior = model.strong_cas(wide, 0xbeef);
    ensure!(prior == 42, "prior is the original value");
    match width {
        Width::W64 => ensure!(model.load() == 42, "w64 keeps the full constant significant"),
        _ => ensure!(model.load() == width.truncate(0xbeef), "sub-64 widths truncate and match"),
    }
    Ok(())
}

fn canonical_scenario<T: NativeInt>() -> Result<()> {
    // All-ones is -1 at every width; the canonical result must sign-extend.
    let minus_one = T::from_bits(T::WIDTH.mask());
    let mut cell = MemoryCell::of(minus_one);
    let prior = cell.strong_cas_canonical(T::from_bits(42), T::from_bits(0xbeef));
    ensure!(prior == minus_one.to_canonical(), "sign-extended prior");
    ensure!(cell.get::<T>() == minus_one, "mismatch leaves cell");

    let mut cell = MemoryCell::of(T::from_bits(42));
    let prior = cell.strong_cas_canonical(T::from_bits(42), T::from_bits(0xbeef));
    ensure!(prior == T::from_bits(42).to_canonical(), "prior on match");
    ensure!(cell.get::<T>() == T::from_bits(0xbeef), "swap installed");
    Ok(())
}

fn rmw_scenario(width: Width, op: RmwOp) -> Result<()> {
    for operand in [1u64, 42] {
        let expect_new = rmw_result(op, 5, operand, width);

        let mut model = MemoryCell::new(width, 5);
        ensure!(model.rmw(op, operand) == 5, "model prior");
        ensure!(model.load() == expect_new, "model result");

        for fencing in [Fencing::Fenced, Fencing::Unfenced] {
            let shared = SharedCell::new(width, 5);
            ensure!(shared.rmw(op, operand, fencing) == 5, "shared prior");
            ensure!(shared.load() == expect_new, "shared result");
        }
    }
    Ok(())
}

fn differential_sweep(width: Width, seed: u64, sweep_cases: usize) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ u64::from(width.bits()));
    for _ in 0..sweep_cases {
        let init: u64 = rng.gen();
        let a: u64 = rng.gen();
        let b: u64 = rng.gen();
        let fencing = if rng.gen_bool(0.5) {
            Fencing::Fenced
        } else {
            Fencing::Unfenced
        };

        let mut model = MemoryCell::new(width, init);
        let shared = SharedCell::new(width, init);

        match rng.gen_range(0..8u32) {
            0 => {
                let expect = model.weak_cas(a, b);
                if expect {
                    // Spurious failures are permitted; retry until commit.
                    while !shared.weak_cas(a, b, fencing) {}
                } else {
                    ensure!(!shared.weak_cas(a, b, fencing), "weak CAS agreement");
                }
            }
            1 => {
                let m = model.strong_cas(a, b);
                let s = shared.strong_cas(a, b, fencing);
                ensure!(m == s, "strong CAS prior agreement");
            }
            n => {
                let op = RmwOp::ALL[(n as usize - 2) % RmwOp::ALL.len()];
                let m = model.rmw(op, a);
                let s = shared.rmw(op, a, fencing);
                ensure!(m == s, "rmw prior agreement");
            }
        }
        ensure!(model.load() == shared.load(), "final value agreement");
    }
    Ok(())
}

/// Reference lowerings: the byte sequences / listings a correct backend
/// produces for each target, used to self-check the expectation tables.
fn reference_compilation(isa: TargetIsa, op: AtomicOp, fencing: Fencing) -> Compilation {
    match isa {
        TargetIsa::X86_64 => {
            let bytes: &[u8] = match op {
                // lock cmpxchg [rdi], esi; ret
                AtomicOp::WeakCas | AtomicOp::StrongCas => &[0xf0, 0x0f, 0xb1, 0x37, 0xc3],
                // lock xadd [rdi], esi; ret
                AtomicOp::XchgAdd | AtomicOp::XchgSub => &[0xf0, 0x0f, 0xc1, 0x37, 0xc3],
                // lock and [rdi], esi; ret
                AtomicOp::XchgAnd => &[0xf0, 0x21, 0x37, 0xc3],
                // lock or [rdi], esi; ret
                AtomicOp::XchgOr => &[0xf0, 0x09, 0x37, 0xc3],
                // lock xor [rdi], esi; ret
                AtomicOp::XchgXor => &[0xf0, 0x31, 0x37, 0xc3],
                // xchg [rdi], esi; ret
                AtomicOp::Xchg => &[0x87, 0x37, 0xc3],
            };
            Compilation::from_bytes(isa, bytes)
        }
        TargetIsa::Aarch64 { lse: true } => {
            let lines: &[&str] = match op {
                AtomicOp::WeakCas | AtomicOp::StrongCas => &["casal w8, w9, [x0]", "ret"],
                AtomicOp::XchgAdd => &["ldaddal w1, w8, [x0]", "ret"],
                AtomicOp::XchgSub => &["neg w9, w1", "ldaddal w9, w8, [x0]", "ret"],
                AtomicOp::XchgAnd => &["mvn w9, w1", "ldclral w9, w8, [x0]", "ret"],
                AtomicOp::XchgOr => &["ldsetal w1, w8, [x0]", "ret"],
                AtomicOp::XchgXor => &["ldeoral w1, w8, [x0]", "ret"],
                AtomicOp::Xchg => &["swpal w1, w8, [x0]", "ret"],
            };
            Compilation::from_disasm(isa, lines.iter().copied())
        }
        TargetIsa::Aarch64 { lse: false } => {
            let lines: &[&str] = match fencing {
                Fencing::Fenced => &[
                    "1: ldaxr w8, [x0]",
                    "add w9, w8, w1",
                    "stlxr w10, w9, [x0]",
                    "cbnz w10, 1b",
                ],
                Fencing::Unfenced => &[
                    "1: ldxr w8, [x0]",
                    "add w9, w8, w1",
                    "stxr w10, w9, [x0]",
                    "cbnz w10, 1b",
                ],
            };
            Compilation::from_disasm(isa, lines.iter().copied())
        }
        TargetIsa::Arm32Thumb2 => Compilation::from_disasm(
            isa,
            [
                "1: ldrex r2, [r0]",
                "adds r3, r2, r1",
                "strex r4, r3, [r0]",
                "cmp r4, #0",
                "bne 1b",
            ],
        ),
    }
}

fn stress_fetch_add(config: Config) -> Result<()> {
    let init = 1_000u64;
    let cell = SharedCell::new(Width::W64, init);

    let mut priors = Vec::with_capacity(config.threads * config.iters);
    thread::scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                let cell = &cell;
                s.spawn(move || {
                    (0..config.iters)
                        .map(|_| cell.rmw(RmwOp::Add, 1, Fencing::Fenced))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for h in handles {
            priors.extend(h.join().expect("stress thread panicked"));
        }
    });

    let total = (config.threads * config.iters) as u64;
    ensure!(cell.load() == init + total, "final counter value");
    priors.sort_unstable();
    ensure!(
        priors == (init..init + total).collect::<Vec<u64>>(),
        "each prior handed out exactly once"
    );
    Ok(())
}

fn stress_xchg_tokens(config: Config) -> Result<()> {
    let cell = SharedCell::new(Width::W64, 0);

    let mut observed = Vec::with_capacity(config.threads * config.iters + 1);
    thread::scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|t| {
                let cell = &cell;
                s.spawn(move || {
                    (0..config.iters)
                        .map(|i| {
                            let token = (t * config.iters + i + 1) as u64;
                            cell.rmw(RmwOp::Xchg, token, Fencing::Fenced)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for h in handles {
            observed.extend(h.join().expect("stress thread panicked"));
        }
    });

    observed.push(cell.load());
    observed.sort_unstable();
    ensure!(
        observed == (0..=(config.threads * config.iters) as u64).collect::<Vec<u64>>(),
        "tokens conserved across exchanges"
    );
    Ok(())
}

fn stress_weak_cas_claims(config: Config) -> Result<()> {
    let cell = SharedCell::new(Width::W32, 0);

    let mut tickets = Vec::with_capacity(config.threads * config.iters);
    thread::scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                let cell = &cell;
                s.spawn(move || {
                    let mut mine = Vec::with_capacity(config.iters);
                    for _ in 0..config.iters {
                        loop {
                            let current = cell.load();
                            if cell.weak_cas(current, current + 1, Fencing::Fenced) {
                                mine.push(current);
                                break;
                            }
                        }
                    }
                    mine
                })
            })
            .collect();
        for h in handles {
            tickets.extend(h.join().expect("stress thread panicked"));
        }
    });

    let total = (config.threads * config.iters) as u64;
    ensure!(cell.load() == total, "final ticket counter");
    tickets.sort_unstable();
    ensure!(
        tickets == (0..total).collect::<Vec<u64>>(),
        "no ticket claimed twice or lost"
    );
    Ok(())
}
