//! Shared fixtures for the workflow integration suites.
#![allow(dead_code)] // not every suite touches every fixture

use std::sync::Arc;

use hr_eval::{CallerContext, EvaluationEngine, GapAnalysisService, MemoryStore, Role};
use uuid::Uuid;

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub engine: EvaluationEngine,
    pub analytics: GapAnalysisService,
    pub organization_id: Uuid,
    pub cycle_id: Uuid,
}

impl TestEnv {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let engine = EvaluationEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let analytics = GapAnalysisService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        Self {
            store,
            engine,
            analytics,
            organization_id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
        }
    }

    pub fn employee(&self) -> CallerContext {
        CallerContext::new(Uuid::new_v4(), self.organization_id, Role::Employee)
    }

    pub fn assessor(&self) -> CallerContext {
        let caller = CallerContext::new(Uuid::new_v4(), self.organization_id, Role::Assessor);
        self.store.add_assessor(self.organization_id, caller.user_id);
        caller
    }

    pub fn hr(&self) -> CallerContext {
        CallerContext::new(Uuid::new_v4(), self.organization_id, Role::Hr)
    }
}
