//! Per-tick intent queue resolved when the clock advances.

use colony_logistics_core::{
    ActionKind, AgentId, CellCoord, MoveOptions, ResourceKind, SourceId, StructureId,
};

/// Agent intent accepted during the decision phase of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Intent {
    Withdraw {
        agent: AgentId,
        structure: StructureId,
        resource: ResourceKind,
        amount: u32,
    },
    Transfer {
        agent: AgentId,
        structure: StructureId,
        resource: ResourceKind,
        amount: u32,
    },
    Harvest {
        agent: AgentId,
        source: SourceId,
    },
    Move {
        agent: AgentId,
        destination: CellCoord,
        options: MoveOptions,
    },
}

impl Intent {
    pub(crate) const fn agent(&self) -> AgentId {
        match self {
            Self::Withdraw { agent, .. }
            | Self::Transfer { agent, .. }
            | Self::Harvest { agent, .. }
            | Self::Move { agent, .. } => *agent,
        }
    }

    pub(crate) const fn kind(&self) -> ActionKind {
        match self {
            Self::Withdraw { .. } => ActionKind::Withdraw,
            Self::Transfer { .. } => ActionKind::Transfer,
            Self::Harvest { .. } => ActionKind::Harvest,
            Self::Move { .. } => ActionKind::Move,
        }
    }
}

/// Intents queued for the current tick, at most one per agent.
#[derive(Debug, Default)]
pub(crate) struct IntentFrame {
    requests: Vec<Intent>,
}

impl IntentFrame {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, agent: AgentId) -> bool {
        self.requests.iter().any(|request| request.agent() == agent)
    }

    pub(crate) fn queue(&mut self, intent: Intent) {
        self.requests.push(intent);
    }

    pub(crate) fn discard(&mut self, agent: AgentId) {
        self.requests.retain(|request| request.agent() != agent);
    }

    pub(crate) fn drain_sorted(&mut self) -> Vec<Intent> {
        self.requests.sort_by_key(Intent::agent);
        self.requests.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, IntentFrame};
    use colony_logistics_core::{AgentId, SourceId};

    #[test]
    fn drain_orders_by_agent_and_empties_frame() {
        let mut frame = IntentFrame::new();
        frame.queue(Intent::Harvest {
            agent: AgentId::new(9),
            source: SourceId::new(0),
        });
        frame.queue(Intent::Harvest {
            agent: AgentId::new(2),
            source: SourceId::new(0),
        });

        assert!(frame.contains(AgentId::new(9)));
        let drained: Vec<_> = frame.drain_sorted().iter().map(Intent::agent).collect();
        assert_eq!(drained, vec![AgentId::new(2), AgentId::new(9)]);
        assert!(!frame.contains(AgentId::new(9)));
    }

    #[test]
    fn discard_removes_only_that_agent() {
        let mut frame = IntentFrame::new();
        frame.queue(Intent::Harvest {
            agent: AgentId::new(1),
            source: SourceId::new(0),
        });
        frame.queue(Intent::Harvest {
            agent: AgentId::new(3),
            source: SourceId::new(0),
        });

        frame.discard(AgentId::new(1));

        assert!(!frame.contains(AgentId::new(1)));
        assert!(frame.contains(AgentId::new(3)));
    }
}
