use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};

use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac;
use crate::trace::{SangerTrace, TraceSource};

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Creates a forward and reverse read pair over a random truth sequence that we can verify against.
/// The forward read covers the start of the truth and the reverse read covers the end, so they overlap in the middle when `read_len` is more than half of `seq_len`.
/// The reverse read is generated on the opposite strand and then reverse complemented back, the way a caller would hand it to the builder.
/// Returns a tuple of (truth, forward, reverse).
/// # Arguments
/// * `seq_len` - the length of the truth sequence
/// * `read_len` - the number of truth bases each read covers
/// * `error_rate` - overall error rate, assumes mismatch, insertion, and deletion are equally likely sub-components of this error rate
/// * `seed` - seed for the random generator, the same seed always gives the same reads
/// # Errors
/// * `InvalidSetting` if `read_len` is longer than `seq_len` or `error_rate` is not a probability
pub fn generate_read_pair(seq_len: usize, read_len: usize, error_rate: f64, seed: u64) -> ConsensusResult<(Vec<u8>, SangerTrace, SangerTrace)> {
    if read_len > seq_len {
        return Err(ConsensusError::InvalidSetting {
            name: "read_len",
            reason: format!("{read_len} is longer than the sequence length {seq_len}")
        });
    }
    if !(0.0..=1.0).contains(&error_rate) {
        return Err(ConsensusError::InvalidSetting {
            name: "error_rate",
            reason: format!("{error_rate} is not in [0.0, 1.0]")
        });
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let base_distribution = Uniform::new(0, BASES.len());
    let truth: Vec<u8> = (0..seq_len)
        .map(|_i| BASES[rng.sample(base_distribution)])
        .collect();

    let (forward_bases, forward_quals) = sample_read(&mut rng, &truth[..read_len], error_rate);
    let forward = SangerTrace::new(&forward_bases, &forward_quals)?;

    let opposite_strand = iupac::reverse_complement(&truth[(seq_len - read_len)..]);
    let (reverse_bases, reverse_quals) = sample_read(&mut rng, &opposite_strand, error_rate);
    let mut reverse = SangerTrace::new(&reverse_bases, &reverse_quals)?;
    reverse.reverse_complement();

    Ok((truth, forward, reverse))
}

/// Copies a template with random errors; correct calls get high qualities and errors get low ones
fn sample_read<R: Rng>(rng: &mut R, template: &[u8], error_rate: f64) -> (Vec<u8>, Vec<u8>) {
    let base_distribution = Uniform::new(0, BASES.len());
    let basem1_distribution = Uniform::new(1, BASES.len());
    let error_distribution = Uniform::new(0.0, 1.0);
    let error_type_distribution = Uniform::new(0, 3);
    let good_quality = Uniform::new_inclusive(25_u8, 61);
    let bad_quality = Uniform::new_inclusive(2_u8, 20);

    let mut bases = vec![];
    let mut quals = vec![];
    let mut template_index = 0;
    while template_index < template.len() {
        let c = template[template_index];
        let is_error = rng.sample(error_distribution) < error_rate;
        if is_error {
            match rng.sample(error_type_distribution) {
                0 => {
                    // substitution
                    let offset = rng.sample(basem1_distribution);
                    let position = BASES.iter().position(|&b| b == c).unwrap_or(0);
                    bases.push(BASES[(position + offset) % BASES.len()]);
                    quals.push(rng.sample(bad_quality));
                    template_index += 1;
                },
                1 => {
                    // deletion
                    template_index += 1;
                },
                _ => {
                    // insertion
                    bases.push(BASES[rng.sample(base_distribution)]);
                    quals.push(rng.sample(bad_quality));
                }
            }
        } else {
            bases.push(c);
            quals.push(rng.sample(good_quality));
            template_index += 1;
        }
    }
    (bases, quals)
}
