use std::sync::Arc;

use sortie_agent::Supervisor;
use sortie_agent::config::UserCredential;

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub users: Arc<Vec<UserCredential>>,
}

impl AppState {
    pub fn new(supervisor: Arc<Supervisor>, users: Vec<UserCredential>) -> Self {
        Self {
            supervisor,
            users: Arc::new(users),
        }
    }
}
