use clap::Args;
use serde::{Deserialize, Serialize};

/// Parameters of the genetic population strategy.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct GeneticParams {
    /// The total population to be calculated per generation.
    #[arg(long, default_value_t = 100)]
    pub population_size: usize,

    /// Members reseeded with completely different values each generation.
    #[arg(long, default_value_t = 10)]
    pub reseed: usize,

    /// The exponent used for selecting the parents to breed.
    #[arg(long, default_value_t = 2.2)]
    pub cross_exponent: f32,

    /// The exponent used for mutation magnitude.
    #[arg(long, default_value_t = 2.0)]
    pub mutation_exponent: f32,

    /// Mutations per member; the fractional part is applied with that probability.
    #[arg(long, default_value_t = 3.1)]
    pub mutation_probability: f32,

    /// The maximum fraction (0 to 1) of a dimension's range one mutation can move.
    #[arg(long, default_value_t = 0.4)]
    pub max_mutation_percent: f32,

    /// The total number of generations to run.
    #[arg(long, default_value_t = 50)]
    pub total_generations: u32,

    /// Enable niche clearing between generations.
    #[arg(long, default_value_t = false)]
    pub niching: bool,

    /// Distance between members below which they share a niche.
    #[arg(long, default_value_t = 2.0)]
    pub niche_distance: f32,

    /// The maximum number of members allowed to survive in one niche.
    #[arg(long, default_value_t = 10)]
    pub niche_capacity: usize,

    /// Normalize each dimension by its range when computing niche distance.
    #[arg(long, default_value_t = false)]
    pub percent_distance: bool,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 100,
            reseed: 10,
            cross_exponent: 2.2,
            mutation_exponent: 2.0,
            mutation_probability: 3.1,
            max_mutation_percent: 0.4,
            total_generations: 50,
            niching: false,
            niche_distance: 2.0,
            niche_capacity: 10,
            percent_distance: false,
        }
    }
}

/// Parameters of the four-probe whisker descent.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct KernelParams {
    /// The number of iterations to process.
    #[arg(long, default_value_t = 25)]
    pub total_iterations: usize,

    /// Probe offset as a fraction of each dimension's range.
    #[arg(long, default_value_t = 0.1)]
    pub whisker_length: f32,

    /// Upper bound of the random per-iteration step weight.
    #[arg(long, default_value_t = 0.01)]
    pub step_weight: f32,

    /// The maximum move a kernel dimension can take in one iteration.
    #[arg(long, default_value_t = 0.1)]
    pub percentage_step_cap: f32,

    /// The fraction of momentum that carries over from the previous iteration.
    #[arg(long, default_value_t = 0.1)]
    pub momentum_residual: f32,

    /// Stop once total momentum falls below this, together with volatility.
    #[arg(long, default_value_t = 100.0)]
    pub momentum_threshold: f32,

    /// Stop once total volatility falls below this, together with momentum.
    #[arg(long, default_value_t = 100.0)]
    pub volatility_threshold: f32,

    /// Iterations allowed without improving on the best-seen fitness.
    #[arg(long, default_value_t = 5)]
    pub iterations_from_best: usize,

    /// The random seed to use for this estimation.
    #[arg(long, default_value_t = 12345)]
    pub random_seed: u64,

    /// Resume from the lowest-fitness row of the evaluation log, if present.
    #[arg(long, default_value_t = false)]
    pub continue_from_best: bool,

    /// Evaluation log scanned when resuming from best.
    #[arg(long)]
    pub evaluation_file: Option<String>,

    /// Optional JSON file of explicit initial parameter values.
    #[arg(long)]
    pub initial_values: Option<String>,

    /// Optional CSV file receiving one volatility row per iteration.
    #[arg(long)]
    pub volatility_trace: Option<String>,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            total_iterations: 25,
            whisker_length: 0.1,
            step_weight: 0.01,
            percentage_step_cap: 0.1,
            momentum_residual: 0.1,
            momentum_threshold: 100.0,
            volatility_threshold: 100.0,
            iterations_from_best: 5,
            random_seed: 12345,
            continue_from_best: false,
            evaluation_file: None,
            initial_values: None,
            volatility_trace: None,
        }
    }
}

/// Parameters of the two-probe gravity descent.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct GravityParams {
    #[arg(long, default_value_t = 25)]
    pub total_iterations: usize,

    #[arg(long, default_value_t = 0.1)]
    pub whisker_length: f32,

    #[arg(long, default_value_t = 0.01)]
    pub step_weight: f32,

    #[arg(long, default_value_t = 12345)]
    pub random_seed: u64,

    #[arg(long, default_value_t = false)]
    pub continue_from_best: bool,

    #[arg(long)]
    pub evaluation_file: Option<String>,

    #[arg(long)]
    pub initial_values: Option<String>,
}

impl Default for GravityParams {
    fn default() -> Self {
        Self {
            total_iterations: 25,
            whisker_length: 0.1,
            step_weight: 0.01,
            random_seed: 12345,
            continue_from_best: false,
            evaluation_file: None,
            initial_values: None,
        }
    }
}

/// Parameters of the exhaustive grid search.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct LinearParams {
    /// Grid step as a fraction of each dimension's range.
    #[arg(long, default_value_t = 0.1)]
    pub interval: f32,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { interval: 0.1 }
    }
}

/// Weights of the combined error function.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct TallyWeights {
    /// The weight applied to the squared-error term.
    #[arg(long, default_value_t = 1.0)]
    pub rmse_weight: f32,

    /// The weight applied to the mean absolute error term.
    #[arg(long, default_value_t = 1.0)]
    pub mabs_weight: f32,

    /// The weight applied to the total signed error term.
    #[arg(long, default_value_t = 1.0)]
    pub terror_weight: f32,

    /// Use |predicted - truth| / truth instead of the raw difference.
    #[arg(long, default_value_t = false)]
    pub percent_error: bool,
}

impl Default for TallyWeights {
    fn default() -> Self {
        Self {
            rmse_weight: 1.0,
            mabs_weight: 1.0,
            terror_weight: 1.0,
            percent_error: false,
        }
    }
}
