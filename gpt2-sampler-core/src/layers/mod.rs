pub mod attention;
pub mod conv1d;
pub mod mlp;
pub mod sampler;
