//! Story run engine.
//!
//! Drives a reader through a published story graph. Every operation
//! re-reads the authoritative rows; the chapter gate is applied before any
//! node content leaves this module, and again on the destination of a
//! choice before it is committed.

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use taleforge_core::error::CoreError;
use taleforge_core::story_run;
use taleforge_core::types::DbId;
use taleforge_core::unlock_gate::ChapterPricing;
use taleforge_db::models::story::{StoryChoice, StoryNode};
use taleforge_db::models::story_run::{NewRunChoice, NodeRating, RunChoice, StoryRun};
use taleforge_db::repositories::{ChoiceCommit, StoryGraphRepo, StoryRunRepo};
use taleforge_events::{EventBus, PlatformEvent};

use super::chapter_gate::{ChapterGate, LockedChapter};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A choice offered on the current node.
#[derive(Debug, Serialize)]
pub struct ChoiceOption {
    pub genre_key: String,
    pub label: String,
}

impl From<StoryChoice> for ChoiceOption {
    fn from(choice: StoryChoice) -> Self {
        Self {
            genre_key: choice.genre_key,
            label: choice.label,
        }
    }
}

/// The node a run currently sits on, with everything needed to render it.
#[derive(Debug, Serialize)]
pub struct CurrentNode {
    pub run_id: DbId,
    pub node: StoryNode,
    pub choices: Vec<ChoiceOption>,
    pub rating_submitted: bool,
    pub is_completed: bool,
}

/// What a reader sees for their run's position: the node or a lock signal.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurrentNodeView {
    Available(CurrentNode),
    Locked(LockedChapter),
}

/// Result of starting or resuming a run.
#[derive(Debug, Serialize)]
pub struct StartedRun {
    pub run: StoryRun,
    /// `false` when an existing resumable run was returned.
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct StoryRunEngine {
    pool: PgPool,
    pricing: Arc<ChapterPricing>,
    event_bus: Arc<EventBus>,
}

impl StoryRunEngine {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            pricing: Arc::clone(&state.pricing),
            event_bus: Arc::clone(&state.event_bus),
        }
    }

    fn gate(&self) -> ChapterGate<'_> {
        ChapterGate::new(&self.pool, &self.pricing)
    }

    /// Start a run of a story's published version, or resume the reader's
    /// open run. `restart` supersedes the open run instead.
    pub async fn start_run(
        &self,
        user_id: DbId,
        story_id: DbId,
        restart: bool,
    ) -> AppResult<StartedRun> {
        let story = StoryGraphRepo::find_story(&self.pool, story_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Story",
                id: story_id,
            })?;
        let version_id = story.published_version_id.ok_or_else(|| {
            CoreError::Validation(format!("Story {story_id} has no published version"))
        })?;
        let start = StoryGraphRepo::find_start_node(&self.pool, version_id)
            .await?
            .ok_or_else(|| {
                integrity_fault(format!("Story version {version_id} has no start node"))
            })?;

        let (run, created) =
            StoryRunRepo::start(&self.pool, user_id, story_id, version_id, start.id, restart)
                .await?;

        if created {
            tracing::info!(run_id = run.id, user_id, story_id, restart, "Story run started");
        } else {
            tracing::debug!(run_id = run.id, user_id, story_id, "Story run resumed");
        }
        Ok(StartedRun { run, created })
    }

    /// The run's current node, or a lock signal if the reader may not see
    /// its chapter. Content is only loaded into the view once the gate
    /// allows it.
    pub async fn get_current_node(
        &self,
        run_id: DbId,
        user_id: DbId,
        plan: &str,
    ) -> AppResult<CurrentNodeView> {
        let run = self.load_run(run_id, user_id).await?;
        let node = self.load_current_node(&run).await?;

        let decision = self
            .gate()
            .decide(user_id, plan, run.story_id, node.step_no)
            .await?;
        if let Some(locked) = LockedChapter::from_decision(node.step_no, decision) {
            return Ok(CurrentNodeView::Locked(locked));
        }

        Ok(CurrentNodeView::Available(self.render(&run, node).await?))
    }

    /// Take the edge labelled `genre_key` from the current node.
    ///
    /// A locked destination is refused with a lock signal and nothing is
    /// written. Otherwise the step's choice and the new position are
    /// committed together and the destination is returned.
    pub async fn choose(
        &self,
        run_id: DbId,
        user_id: DbId,
        plan: &str,
        genre_key: &str,
    ) -> AppResult<CurrentNodeView> {
        story_run::validate_genre_key(genre_key)?;

        let run = self.load_run(run_id, user_id).await?;
        story_run::ensure_open(run.id, run.is_completed, run.is_superseded())?;
        let node = self.load_current_node(&run).await?;

        if StoryRunRepo::find_choice_for_step(&self.pool, run.id, node.step_no)
            .await?
            .is_some()
        {
            return Err(CoreError::AlreadyChosen {
                run_id: run.id,
                step_no: node.step_no,
            }
            .into());
        }

        let edge = StoryGraphRepo::find_choice(&self.pool, node.id, genre_key)
            .await?
            .ok_or_else(|| CoreError::InvalidChoice {
                genre_key: genre_key.to_string(),
            })?;
        let destination = StoryGraphRepo::find_node(&self.pool, edge.to_node_id)
            .await?
            .ok_or_else(|| {
                integrity_fault(format!(
                    "Choice {} points at missing node {}",
                    edge.id, edge.to_node_id
                ))
            })?;
        if let Err(e) = story_run::validate_transition(node.step_no, destination.step_no) {
            tracing::error!(run_id, choice_id = edge.id, error = %e, "Story graph integrity fault");
            return Err(e.into());
        }

        let decision = self
            .gate()
            .decide(user_id, plan, run.story_id, destination.step_no)
            .await?;
        if let Some(locked) = LockedChapter::from_decision(destination.step_no, decision) {
            tracing::debug!(
                run_id,
                step_no = destination.step_no,
                required_coins = locked.required_coins,
                "Choice refused, destination chapter locked"
            );
            return Ok(CurrentNodeView::Locked(locked));
        }

        let commit = StoryRunRepo::commit_choice(
            &self.pool,
            &NewRunChoice {
                run_id: run.id,
                step_no: node.step_no,
                from_node_id: node.id,
                genre_key: genre_key.to_string(),
                to_node_id: destination.id,
            },
        )
        .await?;

        let advanced = match commit {
            ChoiceCommit::Committed(run) => run,
            ChoiceCommit::AlreadyChosen => {
                return Err(CoreError::AlreadyChosen {
                    run_id: run.id,
                    step_no: node.step_no,
                }
                .into())
            }
            ChoiceCommit::RunCompleted => {
                return Err(CoreError::RunCompleted { run_id: run.id }.into())
            }
            ChoiceCommit::Superseded => {
                return Err(CoreError::RunSuperseded { run_id: run.id }.into())
            }
        };

        tracing::info!(
            run_id,
            user_id,
            step_no = node.step_no,
            genre_key,
            to_node_id = destination.id,
            "Choice committed"
        );

        Ok(CurrentNodeView::Available(
            self.render(&advanced, destination).await?,
        ))
    }

    /// Rate the run's current node. Each node can be rated once per run.
    pub async fn submit_rating(
        &self,
        run_id: DbId,
        user_id: DbId,
        plan: &str,
        rating: i16,
    ) -> AppResult<NodeRating> {
        story_run::validate_rating(rating)?;

        let run = self.load_run(run_id, user_id).await?;
        story_run::ensure_open(run.id, run.is_completed, run.is_superseded())?;
        let node = self.load_current_node(&run).await?;

        let decision = self
            .gate()
            .decide(user_id, plan, run.story_id, node.step_no)
            .await?;
        if !decision.is_allowed() {
            return Err(CoreError::Forbidden(format!(
                "Chapter {} is locked and cannot be rated",
                node.step_no
            ))
            .into());
        }

        let saved = StoryRunRepo::insert_rating(&self.pool, run.id, node.id, user_id, rating)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Chapter {} already rated in this run", node.step_no))
            })?;

        tracing::info!(run_id, user_id, node_id = node.id, rating, "Chapter rated");
        self.event_bus.publish(PlatformEvent::chapter_rated(
            user_id,
            run.id,
            node.id,
            node.step_no,
            rating,
        ));

        Ok(saved)
    }

    /// Complete a run that sits on a rated terminal node.
    pub async fn finish_run(&self, run_id: DbId, user_id: DbId) -> AppResult<StoryRun> {
        let run = self.load_run(run_id, user_id).await?;
        let node = self.load_current_node(&run).await?;

        let outgoing = StoryGraphRepo::list_choices_from(&self.pool, node.id).await?;
        let rated = StoryRunRepo::has_rating(&self.pool, run.id, node.id).await?;
        story_run::validate_finish(
            run.id,
            run.is_completed,
            run.is_superseded(),
            outgoing.len(),
            rated,
        )?;

        // Lost a race with another finish or a restart.
        let completed = StoryRunRepo::complete(&self.pool, run.id)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Run {} can no longer be finished", run.id))
            })?;

        tracing::info!(run_id, user_id, story_id = run.story_id, "Story run completed");
        self.event_bus.publish(PlatformEvent::story_completed(
            user_id,
            run.id,
            run.story_id,
        ));

        Ok(completed)
    }

    /// Choices taken in a run, in step order.
    pub async fn list_history(&self, run_id: DbId, user_id: DbId) -> AppResult<Vec<RunChoice>> {
        let run = self.load_run(run_id, user_id).await?;
        Ok(StoryRunRepo::list_choices(&self.pool, run.id).await?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Runs owned by someone else are reported as missing.
    async fn load_run(&self, run_id: DbId, user_id: DbId) -> AppResult<StoryRun> {
        StoryRunRepo::find_for_user(&self.pool, run_id, user_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "StoryRun",
                id: run_id,
            }))
    }

    async fn load_current_node(&self, run: &StoryRun) -> AppResult<StoryNode> {
        StoryGraphRepo::find_node(&self.pool, run.current_node_id)
            .await?
            .ok_or_else(|| {
                integrity_fault(format!(
                    "Run {} points at missing node {}",
                    run.id, run.current_node_id
                ))
            })
    }

    async fn render(&self, run: &StoryRun, node: StoryNode) -> AppResult<CurrentNode> {
        let choices = StoryGraphRepo::list_choices_from(&self.pool, node.id).await?;
        let rating_submitted = StoryRunRepo::has_rating(&self.pool, run.id, node.id).await?;
        Ok(CurrentNode {
            run_id: run.id,
            node,
            choices: choices.into_iter().map(ChoiceOption::from).collect(),
            rating_submitted,
            is_completed: run.is_completed,
        })
    }
}

/// Log a story graph integrity fault and turn it into an internal error.
fn integrity_fault(message: String) -> AppError {
    tracing::error!(error = %message, "Story graph integrity fault");
    AppError::Core(CoreError::Internal(message))
}
