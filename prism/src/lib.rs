use crate::main_loop::EngineLoop;
use prism_core::cli::EngineArgs;
use prism_rendergraph::PassRegistry;

mod engine;
mod main_loop;
mod app;

pub use app::App;
pub use engine::Engine;
pub use prism_core::cli::EngineArgs as Args;

pub use paste::paste;

macro_rules! module_facade {
    ($name:ident) => {
        $crate::paste!{
            pub mod $name {
                pub use [<prism_ $name>]::*;
            }
        }
    };
}

module_facade!(core);
module_facade!(rendergraph);
module_facade!(passes);

/// Parse the command line, set up logging and run the given App for the requested number of frames.
pub fn launch<A: App>() -> Result<(), anyhow::Error> {
    let args = EngineArgs::parse_args();

    prism_core::log::initialize(args.log_level.into())?;
    let _profiler = if args.profile {
        Some(prism_core::profile::initialize()?)
    } else {
        None
    };

    let mut app = A::new(&args)?;

    let mut registry = PassRegistry::new();
    app.register_passes(&mut registry)?;

    let mut engine = Engine::from_args(registry, &args);
    app.setup(&mut engine)?;

    let main_loop = EngineLoop::new(engine, app, args.frames);
    main_loop.run()?;

    Ok(())
}
