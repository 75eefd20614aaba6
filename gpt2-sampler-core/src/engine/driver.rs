use std::io::Write;

use crate::config::{parse_device, RunConfig};
use crate::engine::generator::SequenceGenerator;
use crate::engine::sequence::{continuation_rows, replicate_context};
use crate::error::{Error, Result};
use crate::layers::sampler::Sampler;
use crate::model::ModelSource;
use crate::output::SampleWriter;
use crate::prompts::PromptSet;
use crate::tokenizer::TextCodec;

/// What a finished run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub prompts: usize,
    pub samples: usize,
    /// xxh64 of every byte written to the output.
    pub digest: u64,
}

/// Sample `config.nsamples` continuations for every prompt, in order, and
/// write them to `out`.
pub fn run<S, W>(config: &RunConfig, source: &S, prompts: &PromptSet, out: W) -> Result<RunSummary>
where
    S: ModelSource,
    W: Write,
{
    config.validate()?;
    let batch_size = config.batch_size();
    let batches = config.batches_per_prompt();

    let hparams = source.load_hparams(&config.model_name)?;
    let length = config.resolve_length(&hparams)?;
    let device = parse_device(&config.device)?;

    let sampler = Sampler::new(config.sampling_params(), config.seed);
    let mut generator = SequenceGenerator::new(sampler, length, batch_size);

    let model = source.restore_latest(&config.model_name, &hparams, &device)?;
    let codec = source.load_codec(&config.model_name)?;

    tracing::info!(
        model = %config.model_name,
        prompts = prompts.len(),
        nsamples = config.nsamples,
        batch_size,
        length,
        seed = ?config.seed,
        "Starting sampling run"
    );

    let mut writer = SampleWriter::new(out);
    for (prompt_idx, prompt) in prompts.iter().enumerate() {
        let context = encode_prompt(&codec, prompt)?;
        let positions = positions_needed(context.len(), length);
        if positions > hparams.n_ctx {
            return Err(Error::invalid(format!(
                "prompt {prompt_idx} has {} tokens; with length {length} the model must attend over {positions} positions, window is {}",
                context.len(),
                hparams.n_ctx
            )));
        }
        tracing::debug!(prompt_idx, context_len = context.len(), "Sampling prompt");

        let batch_context = replicate_context(&context, batch_size);
        for batch_idx in 0..batches {
            let batch = generator.sample_sequence(&model, &batch_context)?;
            for row in continuation_rows(&batch, context.len()) {
                let text = codec.decode(&row)?;
                writer.write_sample(&text)?;
            }
            tracing::trace!(prompt_idx, batch_idx, "Batch decoded");
        }
        writer.write_separator()?;
    }

    let summary = RunSummary {
        prompts: prompts.len(),
        samples: writer.emitted(),
        digest: writer.digest(),
    };
    tracing::info!(samples = summary.samples, digest = %format!("{:016x}", summary.digest), "Run finished");
    Ok(summary)
}

/// The last sampled token is never fed back, so a batch occupies
/// `context_len + length - 1` positions.
fn positions_needed(context_len: usize, length: usize) -> usize {
    (context_len + length).saturating_sub(1)
}

/// Empty prompts are conditioned on the end-of-text token.
fn encode_prompt<C: TextCodec>(codec: &C, prompt: &str) -> Result<Vec<u32>> {
    let tokens = codec.encode(prompt)?;
    if !tokens.is_empty() {
        return Ok(tokens);
    }
    codec
        .end_of_text()
        .map(|eot| vec![eot])
        .ok_or_else(|| Error::Tokenization("empty prompt and no end-of-text token".into()))
}
