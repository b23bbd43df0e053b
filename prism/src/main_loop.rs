use crate::app::App;
use crate::Engine;
use log::{error, info};
use prism_rendergraph::RenderGraphError;

pub struct EngineLoop<A> {
    engine: Engine,
    app: A,
    frames: u64,

    frame_count: u64,
    last_tick: std::time::Instant,
    last_time_printed: std::time::Instant,
}

impl<A: App> EngineLoop<A> {
    pub(super) fn new(engine: Engine, app: A, frames: u64) -> Self {
        Self {
            engine,
            app,
            frames,

            frame_count: 0u64,
            last_tick: std::time::Instant::now(),
            last_time_printed: std::time::Instant::now(),
        }
    }

    pub fn run(mut self) -> Result<(), anyhow::Error> {
        for _ in 0..self.frames {
            if self.engine.should_exit() {
                break;
            }
            self.tick()?;
        }

        info!("Rendered {} of {} frames", self.engine.frame_count(), self.frames);
        Ok(())
    }

    #[profiling::function]
    fn tick(&mut self) -> Result<(), anyhow::Error> {
        let delta_time = {
            let now = std::time::Instant::now();
            let delta_time = now - self.last_tick;
            self.last_tick = now;

            let last_time_print_elapsed = (now - self.last_time_printed).as_secs_f32();
            if last_time_print_elapsed > 1. {
                info!("Frame rate: {} fps", self.frame_count as f32 / last_time_print_elapsed);
                self.last_time_printed = now;
                self.frame_count = 0;
            }

            delta_time.as_secs_f32()
        };

        self.app.tick(&mut self.engine, delta_time);

        match self.engine.render_frame() {
            Ok(outputs) => self.app.present(&outputs),
            // a failed pass drops this frame only
            Err(err) => match err.downcast_ref::<RenderGraphError>() {
                Some(RenderGraphError::PassError { .. }) => error!("Frame dropped: {err}"),
                _ => return Err(err),
            },
        }

        self.frame_count += 1;
        Ok(())
    }
}
