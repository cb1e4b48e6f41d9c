use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

// ---------------------------------------------------------------------------
// Synthetic capture generator: a folder with a status log, a binary cube,
// and a background trace, for demos and manual testing.
// ---------------------------------------------------------------------------

const CHANNELS: usize = 1024;
const BINNING: usize = 4;
const RESOLUTION: usize = 64;
const CENTER_NM: f64 = 650.0;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn write_status_log(folder: &Path) {
    let contents = format!(
        "HYP acquisition status\n\
         Horizontal Binning: {BINNING}\n\
         Resolution_X: {RESOLUTION} pixel\n\
         Resolution_Y: {RESOLUTION} pixel\n\
         Real Magnification: 488.28125\n\
         Grating - Groove Density: 150 l/mm\n\
         Central wavelength: {CENTER_NM} nm\n\
         Channels: {CHANNELS}\n\
         Signal Amplification:x2\n\
         Readout Rate (horizontal pixel shift): 1000000 Hz\n\
         Exposure Time: 0.05 s\n\
         HYP Dwelltime: 1.0 ms\n\
         Beam Energy: 6000 V\n\
         Gun Lens: 1.2 A\n\
         Objective Lens: 0.5 A\n\
         Aperture: 100 um\n\
         Aperture Chamber Pressure: 0.0001 Torr\n"
    );
    std::fs::write(folder.join("MicroscopeStatus.txt"), contents)
        .expect("Failed to write status log");
}

/// Wavelength of one effective channel under the fixed export window.
fn channel_wavelength(c: usize, channels: usize) -> f64 {
    (CENTER_NM - 273.0) + 546.0 * c as f64 / channels as f64
}

fn write_cube(folder: &Path, rng: &mut SimpleRng) {
    let channels = CHANNELS / BINNING;
    let file = std::fs::File::create(folder.join("HYPCard.bin"))
        .expect("Failed to create HYPCard.bin");
    let mut out = std::io::BufWriter::new(file);

    // Sample order matches the instrument stream: channel fastest, then x,
    // then y.
    for y in 0..RESOLUTION {
        for x in 0..RESOLUTION {
            // One emission peak whose center and strength drift across the
            // scan, so spatial maps show structure.
            let fx = x as f64 / RESOLUTION as f64;
            let fy = y as f64 / RESOLUTION as f64;
            let mu = CENTER_NM - 40.0 + 80.0 * fx;
            let amp = 2000.0 * (0.3 + 0.7 * (1.0 - fy));

            for c in 0..channels {
                let w = channel_wavelength(c, channels);
                let signal = gaussian(w, mu, 18.0, amp) + 100.0 + rng.gauss(0.0, 12.0);
                out.write_i32::<LittleEndian>(signal.max(0.0) as i32)
                    .expect("Failed to write sample");
            }
        }
    }
    out.flush().expect("Failed to flush HYPCard.bin");
}

fn write_background(folder: &Path, rng: &mut SimpleRng) {
    let channels = CHANNELS / BINNING;
    let mut contents = String::new();

    // Row 0: wavelengths. Row 1: the trace the loader picks up.
    for c in 0..channels {
        contents.push_str(&format!("{:.3} ", channel_wavelength(c, channels)));
    }
    contents.push('\n');
    for _ in 0..channels {
        contents.push_str(&format!("{:.1} ", 100.0 + rng.gauss(0.0, 3.0)));
    }
    contents.push('\n');

    std::fs::write(folder.join("Background_650nm.txt"), contents)
        .expect("Failed to write background");
}

fn main() {
    let base = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());

    // Folder named per the vendor convention: sample name plus a 37-char
    // generated suffix that the loader strips back off.
    let folder_name = "SyntheticGaN--2026-08-07--12-00-00--HYP-000001---";
    let folder = Path::new(&base).join(folder_name);
    std::fs::create_dir_all(&folder).expect("Failed to create capture folder");

    let mut rng = SimpleRng::new(42);
    write_status_log(&folder);
    write_cube(&folder, &mut rng);
    write_background(&folder, &mut rng);

    let samples = (CHANNELS / BINNING) * RESOLUTION * RESOLUTION;
    println!(
        "Wrote {} ({} samples, {} x {} scan, {} channels)",
        folder.display(),
        samples,
        RESOLUTION,
        RESOLUTION,
        CHANNELS / BINNING
    );
}
