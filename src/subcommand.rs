use super::*;

mod benchmark;
mod mine;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Mine against a pool")]
    Mine(mine::Mine),
    #[command(about = "Measure local hash rate against a random scratchpad")]
    Benchmark(benchmark::Benchmark),
}

impl Subcommand {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        match self {
            Self::Mine(mine) => mine.run(settings, cancel).await,
            Self::Benchmark(benchmark) => benchmark.run(settings, cancel).await,
        }
    }
}
