use engine_logging::{engine_debug, engine_info};

use crate::{Effect, Msg, RunState, Session};

/// Pure controller transition: applies a message to the session and returns
/// the effects the engine must carry out, in order.
pub fn update(mut session: Session, msg: Msg) -> (Session, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested { preserve_window } => {
            if session.phase().is_active() {
                engine_debug!("start ignored, run already active");
                return (session, Vec::new());
            }
            let run = RunState::start(preserve_window);
            match session.begin(run.clone()) {
                Some(first) => {
                    engine_info!("run started at partition {first}");
                    vec![Effect::PersistCursor(run), Effect::NavigateTo(first)]
                }
                None => vec![Effect::ClearCursor, Effect::RunComplete],
            }
        }
        Msg::Resume(run) => {
            if !run.running {
                return (session, Vec::new());
            }
            match session.begin(run) {
                Some(current) => {
                    engine_info!("resuming run at partition {current}");
                    vec![Effect::NavigateTo(current)]
                }
                None => vec![Effect::ClearCursor, Effect::RunComplete],
            }
        }
        Msg::Positioned => match session.enter_processing() {
            Some(p) => vec![Effect::ProcessPartition(p)],
            None => Vec::new(),
        },
        Msg::PartitionExhausted => match session.complete_current() {
            Some((done, Some(next))) => {
                let mut effects = vec![Effect::PartitionDone(done)];
                if let Some(run) = session.run() {
                    effects.push(Effect::PersistCursor(run.clone()));
                }
                effects.push(Effect::NavigateTo(next));
                effects
            }
            Some((done, None)) => {
                engine_info!("all partitions completed");
                vec![
                    Effect::PartitionDone(done),
                    Effect::ClearCursor,
                    Effect::RunComplete,
                ]
            }
            None => Vec::new(),
        },
        Msg::StopRequested => {
            if !session.phase().is_active() {
                return (session, Vec::new());
            }
            session.halt();
            vec![Effect::ClearCursor, Effect::Halted]
        }
    };

    (session, effects)
}
