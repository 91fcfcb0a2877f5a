use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array2;

use ecg_corpus::data::matfile::{write_level4, Precision};
use ecg_corpus::data::signal::SIGNAL_VARIABLE;
use ecg_corpus::{DxCode, LEAD_NAMES};

const SAMPLE_RATE: f64 = 500.0;
const GAIN: f64 = 1000.0;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// P, Q, R, S, T waves of one beat as (offset s, width s, amplitude mV).
const BEAT: [(f64, f64, f64); 5] = [
    (0.10, 0.020, 0.15),
    (0.23, 0.008, -0.10),
    (0.25, 0.010, 1.00),
    (0.27, 0.008, -0.25),
    (0.48, 0.040, 0.30),
];

/// Relative QRS amplitude per lead, roughly following a normal axis.
const LEAD_SCALE: [f64; 12] = [
    0.8, 1.0, 0.4, -0.9, 0.3, 0.7, -0.6, -0.3, 0.5, 1.1, 1.2, 0.9,
];

fn generate_leads(samples: usize, heart_rate: f64, t_wave: f64, rng: &mut SimpleRng) -> Array2<f64> {
    let period = 60.0 / heart_rate;
    Array2::from_shape_fn((LEAD_NAMES.len(), samples), |(lead, i)| {
        let t = i as f64 / SAMPLE_RATE;
        let phase = t % period;
        let mv: f64 = BEAT
            .iter()
            .enumerate()
            .map(|(wave, &(mu, sigma, amp))| {
                let amp = if wave == 4 { amp * t_wave } else { amp };
                gaussian(phase, mu, sigma, amp)
            })
            .sum();
        (mv * LEAD_SCALE[lead] + rng.gauss(0.0, 0.01)) * GAIN
    })
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn write_header(
    path: &Path,
    stem: &str,
    leads: &Array2<f64>,
    age: u32,
    sex: &str,
    codes: &[DxCode],
) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(
        out,
        "{stem} {} {} {} 16-Oct-2026 10:00:00",
        leads.nrows(),
        SAMPLE_RATE,
        leads.ncols()
    )?;
    for (name, lead) in LEAD_NAMES.iter().zip(leads.rows()) {
        let first = lead.first().copied().unwrap_or(0.0).round() as i64;
        let checksum = lead.iter().map(|v| v.round() as i64).sum::<i64>() as i16;
        writeln!(out, "{stem}.mat 16+24 {GAIN}/mV 16 0 {first} {checksum} 0 {name}")?;
    }
    let dx = codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "#Age: {age}")?;
    writeln!(out, "#Sex: {sex}")?;
    writeln!(out, "#Dx: {dx}")?;
    writeln!(out, "#Rx: Unknown")?;
    writeln!(out, "#Hx: Unknown")?;
    writeln!(out, "#Sx: Unknown")?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let root = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data/samples"));
    let mut rng = SimpleRng::new(42);

    // (partition, record prefix, record count, samples per lead)
    let partitions = [
        ("synthetic_cpsc", "A", 12, 5000),
        ("synthetic_georgia", "E", 8, 5000),
        ("synthetic_ptbxl", "HR", 6, 2500),
    ];
    let code_sets: [&[DxCode]; 6] = [
        &[426783006],
        &[164861001],
        &[164861001, 59931005],
        &[164865005, 426434006, 426434006],
        &[59931005, 426783006],
        &[164889003],
    ];
    let sexes = ["Male", "Female", "Unknown"];

    let mut written = 0;
    for (partition, prefix, count, samples) in partitions {
        let dir = root.join(partition);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        for n in 1..=count {
            let stem = format!("{prefix}{n:04}");
            let codes = code_sets[rng.below(code_sets.len())];
            // ischemic findings get inverted T waves
            let t_wave = if codes.contains(&59931005) || codes.contains(&164861001) {
                -1.0
            } else {
                1.0
            };
            let heart_rate = 55.0 + rng.next_f64() * 45.0;
            let leads = generate_leads(samples, heart_rate, t_wave, &mut rng);

            let mat_path = dir.join(format!("{stem}.mat"));
            let file = File::create(&mat_path)
                .with_context(|| format!("creating {}", mat_path.display()))?;
            let mut out = BufWriter::new(file);
            write_level4(&mut out, SIGNAL_VARIABLE, &leads, Precision::Int16)?;
            out.flush()?;

            let age = 20 + rng.below(70) as u32;
            let sex = sexes[rng.below(sexes.len())];
            write_header(&dir.join(format!("{stem}.hea")), &stem, &leads, age, sex, codes)?;
            written += 1;
        }
        log::info!("wrote {count} records to {}", dir.display());
    }

    println!("Wrote {written} synthetic records under {}", root.display());
    Ok(())
}
