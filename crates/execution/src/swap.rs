//! Multi-hop swap chains over a module's token pairs
//!
//! A chain walks the pair graph from a start token to an end token in a
//! given number of hops. The next token is picked at run time so the chain
//! can route around failed hops and still land on the end token.

use std::collections::{BTreeMap, BTreeSet};

use chainrun_config::ModuleCatalog;
use chainrun_tasks::{
    keys, Account, NetworkName, Params, SettingValue, Task, Token, TokenSelector,
    TransactionStatus,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::context::ExecutionContext;
use crate::flows::Executor;

const DEFAULT_SWAPS: usize = 5;
const DEFAULT_MIN_PERCENTAGE: f64 = 1.0;
const DEFAULT_MAX_PERCENTAGE: f64 = 90.0;
/// Share of the native token a later hop may spend, the rest pays fees
const NATIVE_PERCENTAGE_CAP: f64 = 95.0;

/// Undirected adjacency between swappable tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenGraph {
    adjacency: BTreeMap<Token, BTreeSet<Token>>,
}

impl TokenGraph {
    /// Keep the pairs whose tokens are both allowed and neither excluded
    pub fn build(
        pairs: &[(Token, Token)],
        allow: Option<&BTreeSet<Token>>,
        exclude: Option<&BTreeSet<Token>>,
    ) -> Self {
        let permitted = |token: &Token| {
            allow.map_or(true, |allow| allow.contains(token))
                && exclude.map_or(true, |exclude| !exclude.contains(token))
        };

        let mut adjacency: BTreeMap<Token, BTreeSet<Token>> = BTreeMap::new();
        for &(a, b) in pairs {
            if a != b && permitted(&a) && permitted(&b) {
                adjacency.entry(a).or_default().insert(b);
                adjacency.entry(b).or_default().insert(a);
            }
        }
        Self { adjacency }
    }

    /// Graph for a swap task on `network`
    pub fn for_task(catalog: &ModuleCatalog, task: &Task, network: NetworkName) -> Self {
        Self::build(
            catalog.swap_pairs(task.module, network),
            task.params.tokens(keys::SWAP_TOKENS),
            task.params.tokens(keys::EXCLUDE_TOKENS),
        )
    }

    /// Tokens with at least one pair
    pub fn tokens(&self) -> Vec<Token> {
        self.adjacency.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn neighbours(&self, token: Token) -> Vec<Token> {
        self.adjacency
            .get(&token)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_adjacent(&self, a: Token, b: Token) -> bool {
        self.adjacency.get(&a).map_or(false, |set| set.contains(&b))
    }
}

/// How a chain attempt ended, from the planner's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopVerdict {
    /// Try `target` next
    Continue,

    /// Give up on the chain
    Abort,
}

/// Chooses hop targets and tracks progress of one chain
#[derive(Debug)]
pub struct HopPlanner<'g> {
    graph: &'g TokenGraph,
    end: Token,
    budget: usize,
    completed: usize,
    current: Token,
    target: Token,
    excluded: BTreeSet<Token>,
}

impl<'g> HopPlanner<'g> {
    /// Plan a chain of `budget` hops. A single hop goes straight to the end;
    /// `None` when the start has no pairs.
    pub fn new<R: Rng + ?Sized>(
        graph: &'g TokenGraph,
        start: Token,
        end: Token,
        budget: usize,
        rng: &mut R,
    ) -> Option<Self> {
        let target = if budget == 1 {
            end
        } else {
            *graph.neighbours(start).choose(rng)?
        };
        Some(Self {
            graph,
            end,
            budget,
            completed: 0,
            current: start,
            target,
            excluded: BTreeSet::new(),
        })
    }

    pub fn current(&self) -> Token {
        self.current
    }

    pub fn target(&self) -> Token {
        self.target
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Successful hops so far
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.budget
    }

    fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.completed)
    }

    /// Advance to the target and choose the next one
    pub fn record_success<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.current = self.target;
        self.completed += 1;
        self.excluded.clear();
        if !self.is_finished() {
            self.target = self.next_target(rng);
        }
    }

    /// Exclude the failed target and pick another neighbour of the same source
    pub fn record_failure<R: Rng + ?Sized>(&mut self, rng: &mut R) -> HopVerdict {
        self.excluded.insert(self.target);
        let open: Vec<Token> = self
            .graph
            .neighbours(self.current)
            .into_iter()
            .filter(|token| !self.excluded.contains(token))
            .collect();

        if open.is_empty() || (self.remaining() == 1 && self.completed > 0) {
            return HopVerdict::Abort;
        }
        match open.choose(rng) {
            Some(&token) => {
                self.target = token;
                HopVerdict::Continue
            }
            None => HopVerdict::Abort,
        }
    }

    fn next_target<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Token {
        let graph = self.graph;
        let end = self.end;
        let neighbours = graph.neighbours(self.current);
        let bridges = |token: &Token| graph.is_adjacent(*token, end);

        match self.remaining() {
            1 => {
                if graph.is_adjacent(self.current, end) {
                    return end;
                }
                // The end is out of reach from here; walk one more hop.
                self.budget += 1;
                let bridging: Vec<Token> = neighbours.iter().copied().filter(bridges).collect();
                let pool = if bridging.is_empty() { &neighbours } else { &bridging };
                pool.choose(rng).copied().unwrap_or(end)
            }
            2 => {
                let others: Vec<Token> = neighbours.into_iter().filter(|t| *t != end).collect();
                let bridging: Vec<Token> = others.iter().copied().filter(bridges).collect();
                if let Some(&token) = bridging.choose(rng) {
                    token
                } else {
                    // No bridge: this detour costs one extra hop, added by
                    // the final-hop branch once the end turns out unreachable.
                    others.choose(rng).copied().unwrap_or(end)
                }
            }
            _ => neighbours.choose(rng).copied().unwrap_or(end),
        }
    }
}

/// Start of a chain after resolving the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Start {
    Token(Token),
    /// Fan out over every owned token
    All,
}

fn resolve_start(
    graph: &TokenGraph,
    params: &Params,
    ctx: &mut ExecutionContext,
) -> Option<Start> {
    match params.selector_or(keys::START_TOKEN, TokenSelector::Token(Token::Eth)) {
        TokenSelector::Token(token) => Some(Start::Token(token)),
        TokenSelector::Random => graph.tokens().choose(ctx.rng()).copied().map(Start::Token),
        TokenSelector::Last => Some(Start::Token(ctx.last_token)),
        TokenSelector::All => Some(Start::All),
    }
}

fn resolve_end(
    graph: &TokenGraph,
    params: &Params,
    start: Start,
    swaps: usize,
    ctx: &mut ExecutionContext,
) -> Option<Token> {
    let mut selector = params.selector_or(keys::END_TOKEN, TokenSelector::Token(Token::Eth));
    if let (TokenSelector::Token(token), Start::Token(start)) = (selector, start) {
        // A single hop onto itself is meaningless
        if swaps == 1 && token == start {
            selector = TokenSelector::Random;
        }
    }

    match selector {
        TokenSelector::Token(token) => Some(token),
        TokenSelector::Random => {
            let candidates: Vec<Token> = graph
                .tokens()
                .into_iter()
                .filter(|token| swaps != 1 || Start::Token(*token) != start)
                .collect();
            candidates.choose(ctx.rng()).copied()
        }
        TokenSelector::Last => Some(ctx.last_token),
        TokenSelector::All => None,
    }
}

/// Sizing settings of the original task
#[derive(Debug, Clone, Copy)]
struct Sizing {
    min_percentage: f64,
    max_percentage: f64,
    amount: Option<(f64, f64)>,
    amount_usd: Option<(f64, f64)>,
}

impl Sizing {
    fn of(params: &Params) -> Self {
        let both = |min, max| Some((params.f64(min)?, params.f64(max)?));
        Self {
            min_percentage: params.f64_or(keys::MIN_PERCENTAGE, DEFAULT_MIN_PERCENTAGE),
            max_percentage: params.f64_or(keys::MAX_PERCENTAGE, DEFAULT_MAX_PERCENTAGE),
            amount: both(keys::MIN_AMOUNT, keys::MAX_AMOUNT),
            amount_usd: both(keys::MIN_AMOUNT_USD, keys::MAX_AMOUNT_USD),
        }
    }

    /// Write the bounds for a hop out of `from`
    fn apply(&self, params: &mut Params, from: Token, start: Token, native: Token, successes: usize) {
        let (min, max) = if from == native && successes > 0 {
            (
                self.min_percentage.min(NATIVE_PERCENTAGE_CAP),
                self.max_percentage.min(NATIVE_PERCENTAGE_CAP),
            )
        } else if from == start || successes == 0 {
            (self.min_percentage, self.max_percentage)
        } else {
            (100.0, 100.0)
        };
        params.set(keys::MIN_PERCENTAGE, SettingValue::Number(min));
        params.set(keys::MAX_PERCENTAGE, SettingValue::Number(max));

        let absolute = [
            (keys::MIN_AMOUNT, keys::MAX_AMOUNT, self.amount),
            (keys::MIN_AMOUNT_USD, keys::MAX_AMOUNT_USD, self.amount_usd),
        ];
        for (min_key, max_key, bounds) in absolute {
            match bounds {
                Some((min, max)) if successes == 0 || from == start => {
                    params.set(min_key, SettingValue::Number(min));
                    params.set(max_key, SettingValue::Number(max));
                }
                _ => {
                    params.remove(min_key);
                    params.remove(max_key);
                }
            }
        }
    }
}

impl Executor {
    /// Swap task: a chain of hops, or one hop per owned token
    pub(crate) async fn run_swap(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &mut Task,
    ) -> TransactionStatus {
        let controller = self.controller();
        let Some(network) = controller.resolve_network(task.module, task.function, &task.params)
        else {
            warn!("No network configured for {}, skipping", task);
            return TransactionStatus::Success;
        };

        let graph = TokenGraph::for_task(controller.catalog(), task, network);
        let swaps = task.params.usize_or(keys::SWAPS, DEFAULT_SWAPS);
        if graph.len() < 2 && swaps != 1 {
            error!("At least 2 tokens required for {}", task.module);
            return TransactionStatus::Failed;
        }

        let Some(start) = resolve_start(&graph, &task.params, ctx) else {
            error!("No start token available for {}", task.module);
            return TransactionStatus::Failed;
        };

        match start {
            Start::All => {
                let Some(end) = resolve_end(&graph, &task.params, start, swaps, ctx) else {
                    error!("Invalid end token for {}", task.module);
                    return TransactionStatus::Failed;
                };
                self.fan_out(account, ctx, task, network, &graph, end, swaps)
                    .await
            }
            Start::Token(start) => {
                self.run_chain(account, ctx, task, network, &graph, start, swaps)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_chain(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &mut Task,
        network: NetworkName,
        graph: &TokenGraph,
        start: Token,
        swaps: usize,
    ) -> TransactionStatus {
        let Some(end) = resolve_end(graph, &task.params, Start::Token(start), swaps, ctx) else {
            error!("No end token available for {}", task.module);
            return TransactionStatus::Failed;
        };
        let Some(mut planner) = HopPlanner::new(graph, start, end, swaps, ctx.rng()) else {
            error!("{} has no pairs for {} on {}", task.module, start, network);
            return TransactionStatus::Failed;
        };

        info!(
            "Swapping {} -> {} in {} hops on {}",
            start,
            end,
            planner.budget(),
            task.module
        );

        let sizing = Sizing::of(&task.params);
        let native = network.native_token();
        let function = task.function;
        let mut status = TransactionStatus::Success;

        // Hop settings are written into the task itself
        while !planner.is_finished() {
            let from = planner.current();
            let to = planner.target();
            task.params.set_token(keys::FROM_TOKEN, from);
            task.params.set_token(keys::TO_TOKEN, to);
            sizing.apply(&mut task.params, from, start, native, planner.completed());

            status = if from == to {
                TransactionStatus::Success
            } else {
                self.controller().execute(account, ctx, task, function).await
            };

            if status.is_success() {
                debug!(%from, %to, hop = planner.completed() + 1, "Hop done");
                ctx.last_token = to;
                planner.record_success(ctx.rng());
            } else {
                match planner.record_failure(ctx.rng()) {
                    HopVerdict::Continue => {
                        warn!("Swap {} -> {} failed with {}, rerouting", from, to, status);
                    }
                    HopVerdict::Abort => {
                        error!("Failed to swap {} -> {} on {}: {}", from, to, task.module, status);
                        return status;
                    }
                }
            }

            if !planner.is_finished() {
                let delay = ctx.next_delay();
                self.controller().sleeper().wait(delay).await;
            }
        }
        status
    }

    /// One single-hop swap out of every owned token above the floor
    #[allow(clippy::too_many_arguments)]
    async fn fan_out(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &Task,
        network: NetworkName,
        graph: &TokenGraph,
        end: Token,
        swaps: usize,
    ) -> TransactionStatus {
        let candidates: Vec<Token> = graph.tokens().into_iter().filter(|t| *t != end).collect();
        let owned = match self.tokens_above_floor(account, network, &candidates, &task.params).await {
            Ok(owned) => owned,
            Err(e) => {
                error!("Balance check for {} failed: {:#}", task.module, e);
                return TransactionStatus::Failed;
            }
        };
        if owned.is_empty() {
            info!("No tokens with balance for {}", task.module);
            return TransactionStatus::Success;
        }

        let mut chosen: Vec<Token> = owned
            .choose_multiple(ctx.rng(), swaps.min(owned.len()))
            .copied()
            .collect();
        chosen.shuffle(ctx.rng());

        let sizing = Sizing::of(&task.params);
        let mut result = TransactionStatus::Success;
        for (index, token) in chosen.iter().copied().enumerate() {
            let mut single = task.clone();
            for key in [
                keys::MIN_AMOUNT,
                keys::MAX_AMOUNT,
                keys::MIN_AMOUNT_USD,
                keys::MAX_AMOUNT_USD,
            ] {
                single.params.remove(key);
            }
            single
                .params
                .set(keys::START_TOKEN, SettingValue::Token(TokenSelector::Token(token)));
            single.params.set(keys::SWAPS, SettingValue::Integer(1));
            single
                .params
                .set(keys::MIN_PERCENTAGE, SettingValue::Number(sizing.min_percentage));
            single
                .params
                .set(keys::MAX_PERCENTAGE, SettingValue::Number(sizing.max_percentage));

            let status = self
                .run_chain(account, ctx, &mut single, network, graph, token, 1)
                .await;
            if !status.is_success() && result.is_success() {
                result = status;
            }

            if index + 1 < chosen.len() {
                let delay = ctx.next_delay();
                self.controller().sleeper().wait(delay).await;
            }
        }
        result
    }

    async fn tokens_above_floor(
        &self,
        account: &Account,
        network: NetworkName,
        candidates: &[Token],
        params: &Params,
    ) -> anyhow::Result<Vec<Token>> {
        let min_amount = params.f64_or(keys::MIN_AMOUNT, 0.0);
        let min_amount_usd = params.f64(keys::MIN_AMOUNT_USD);

        let mut owned = Vec::new();
        for &token in candidates {
            let balance = self.balances().balance(account, network, token).await?;
            let mut floor = min_amount;
            if let Some(usd) = min_amount_usd {
                let price = self.balances().price_usd(token).await?;
                if price <= 0.0 {
                    anyhow::bail!("price of {} is not positive", token);
                }
                floor = floor.max(usd / price);
            }
            if balance > floor {
                owned.push(token);
            }
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, FixedBalances, ScriptedAdapter};
    use chainrun_tasks::{ModuleName, SleepRange};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use Token::{Dai as B, Eth as E, Usdc as A, Usdt as C, Wbtc as D};

    fn graph(pairs: &[(Token, Token)]) -> TokenGraph {
        TokenGraph::build(pairs, None, None)
    }

    /// Walk a chain where every hop succeeds
    fn walk(graph: &TokenGraph, start: Token, end: Token, budget: usize, seed: u64) -> Vec<(Token, Token)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut planner = HopPlanner::new(graph, start, end, budget, &mut rng).unwrap();
        let mut hops = Vec::new();
        while !planner.is_finished() {
            hops.push((planner.current(), planner.target()));
            planner.record_success(&mut rng);
            assert!(hops.len() <= budget + 2, "chain does not terminate: {:?}", hops);
        }
        hops
    }

    fn assert_connected(hops: &[(Token, Token)], start: Token, end: Token) {
        assert_eq!(hops.first().map(|hop| hop.0), Some(start));
        assert_eq!(hops.last().map(|hop| hop.1), Some(end));
        for window in hops.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
    }

    #[test]
    fn test_graph_respects_allow_and_exclude_lists() {
        let pairs = [(A, B), (B, C), (A, C), (A, D)];
        let allow = [A, B, C].into_iter().collect();
        let exclude = [B].into_iter().collect();

        let graph = TokenGraph::build(&pairs, Some(&allow), Some(&exclude));
        assert_eq!(graph.tokens(), vec![A, C]);
        assert!(graph.is_adjacent(A, C) && graph.is_adjacent(C, A));
        assert!(graph.neighbours(D).is_empty());
    }

    #[test]
    fn test_triangle_keeps_three_hops() {
        let graph = graph(&[(A, B), (B, C), (A, C)]);
        for seed in 0..200 {
            let hops = walk(&graph, A, C, 3, seed);
            assert_eq!(hops.len(), 3, "seed {}: {:?}", seed, hops);
            assert_connected(&hops, A, C);
            if hops[2].0 == B {
                assert_eq!(hops[2].1, C);
            }
        }
    }

    #[test]
    fn test_missing_bridge_grows_budget_by_one() {
        let graph = graph(&[(A, B), (A, E), (E, C)]);
        for seed in 0..100 {
            let hops = walk(&graph, A, C, 3, seed);
            assert_eq!(hops.len(), 4, "seed {}: {:?}", seed, hops);
            assert_connected(&hops, A, C);
        }
    }

    #[test]
    fn test_final_hop_detours_through_bridge() {
        let graph = graph(&[(D, B), (B, A), (A, C)]);
        let hops = walk(&graph, D, C, 2, 1);
        assert_eq!(hops, vec![(D, B), (B, A), (A, C)]);
    }

    #[test]
    fn test_two_token_graph_bounces_to_the_end() {
        let graph = graph(&[(A, C)]);
        for seed in 0..20 {
            assert_eq!(walk(&graph, A, C, 3, seed), vec![(A, C), (C, A), (A, C)]);
            assert_eq!(
                walk(&graph, A, A, 3, seed),
                vec![(A, C), (C, A), (A, C), (C, A)]
            );
        }
    }

    #[test]
    fn test_single_hop_goes_straight_to_the_end() {
        let graph = graph(&[(A, B), (B, C)]);
        assert_eq!(walk(&graph, A, C, 1, 3), vec![(A, C)]);
    }

    #[test]
    fn test_failures_reroute_then_abort() {
        let graph = graph(&[(A, B), (A, C), (B, C)]);
        let mut rng = StdRng::seed_from_u64(5);
        let mut planner = HopPlanner::new(&graph, A, C, 3, &mut rng).unwrap();

        let first = planner.target();
        assert_eq!(planner.record_failure(&mut rng), HopVerdict::Continue);
        assert_ne!(planner.target(), first);
        assert_eq!(planner.record_failure(&mut rng), HopVerdict::Abort);
    }

    #[test]
    fn test_failed_final_hop_after_success_aborts() {
        let graph = graph(&[(A, B), (B, C)]);
        let mut rng = StdRng::seed_from_u64(9);
        let mut planner = HopPlanner::new(&graph, A, C, 2, &mut rng).unwrap();

        planner.record_success(&mut rng);
        assert_eq!(planner.target(), C);
        assert_eq!(planner.record_failure(&mut rng), HopVerdict::Abort);
    }

    fn catalog_with_pairs(pairs: &[(Token, Token)]) -> ModuleCatalog {
        let mut catalog = ModuleCatalog::mainnet();
        for set in catalog
            .swap_pairs
            .iter_mut()
            .filter(|set| set.module == ModuleName::Avnu)
        {
            set.pairs = pairs.to_vec();
        }
        catalog
    }

    fn swap_task(start: TokenSelector, end: TokenSelector, swaps: u64) -> Task {
        Task::new(ModuleName::Avnu)
            .with_param(keys::START_TOKEN, SettingValue::Token(start))
            .with_param(keys::END_TOKEN, SettingValue::Token(end))
            .with_param(keys::SWAPS, SettingValue::Integer(swaps))
    }

    fn ctx(seed: u64) -> ExecutionContext {
        ExecutionContext::seeded(SleepRange::new(1.0, 2.0), seed)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_sizes_intermediate_hops_at_full_balance() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_catalog(catalog_with_pairs(&[(A, B), (B, C), (A, C)]));
        let account = Account::new("0x01");
        let mut ctx = ctx(11);

        let mut task = swap_task(A.into(), C.into(), 3)
            .with_param(keys::MIN_PERCENTAGE, SettingValue::Number(20.0))
            .with_param(keys::MAX_PERCENTAGE, SettingValue::Number(40.0));
        let status = h.executor.run_task(&account, &mut ctx, &mut task).await;

        assert_eq!(status, TransactionStatus::Success);
        assert_eq!(ctx.last_token, C);
        let calls = adapter.recorded();
        assert_eq!(calls.len(), 3);
        assert_connected(&adapter.hops(), A, C);
        assert_eq!(calls[0].params.f64(keys::MAX_PERCENTAGE), Some(40.0));
        assert_eq!(calls[1].params.f64(keys::MIN_PERCENTAGE), Some(100.0));
        assert_eq!(calls[1].params.f64(keys::MAX_PERCENTAGE), Some(100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_holds_settings_of_last_hop() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_catalog(catalog_with_pairs(&[(A, B), (B, C), (A, C)]));

        let mut task = swap_task(A.into(), C.into(), 3);
        assert!(!task.params.contains(keys::FROM_TOKEN));
        let status = h.executor.run_task(&Account::new("0x01"), &mut ctx(5), &mut task).await;

        assert_eq!(status, TransactionStatus::Success);
        let hops = adapter.hops();
        assert_eq!(hops.len(), 3);
        assert_eq!(task.params.token(keys::FROM_TOKEN), Some(hops[2].0));
        assert_eq!(task.params.token(keys::TO_TOKEN), Some(C));
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_token_is_capped_and_start_restores_bounds() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_catalog(catalog_with_pairs(&[(E, A)]));
        let account = Account::new("0x01");

        let mut task = swap_task(A.into(), A.into(), 3)
            .with_param(keys::MIN_PERCENTAGE, SettingValue::Number(50.0))
            .with_param(keys::MAX_PERCENTAGE, SettingValue::Number(99.0))
            .with_param(keys::MIN_AMOUNT, SettingValue::Number(1.0))
            .with_param(keys::MAX_AMOUNT, SettingValue::Number(2.0));
        let status = h.executor.run_task(&account, &mut ctx(3), &mut task).await;
        assert_eq!(status, TransactionStatus::Success);

        let calls = adapter.recorded();
        assert_eq!(adapter.hops(), vec![(A, E), (E, A), (A, E), (E, A)]);
        assert_eq!(calls[0].params.f64(keys::MIN_AMOUNT), Some(1.0));
        assert_eq!(calls[1].params.f64(keys::MIN_PERCENTAGE), Some(50.0));
        assert_eq!(calls[1].params.f64(keys::MAX_PERCENTAGE), Some(95.0));
        assert!(!calls[1].params.contains(keys::MIN_AMOUNT));
        assert_eq!(calls[2].params.f64(keys::MAX_PERCENTAGE), Some(99.0));
        assert_eq!(calls[2].params.f64(keys::MAX_AMOUNT), Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_hop_is_routed_around() {
        let adapter = ScriptedAdapter::from_fn(|call| {
            if call.params.token(keys::TO_TOKEN) == Some(B) {
                TransactionStatus::Failed
            } else {
                TransactionStatus::Success
            }
        });
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_catalog(catalog_with_pairs(&[(A, B), (A, E), (B, C), (E, C)]));
        let account = Account::new("0x01");

        for seed in 0..10 {
            let mut ctx = ctx(seed);
            let status = h
                .executor
                .run_task(&account, &mut ctx, &mut swap_task(A.into(), C.into(), 2))
                .await;
            assert_eq!(status, TransactionStatus::Success);
            assert_eq!(ctx.last_token, C);
        }
        let succeeded: Vec<_> = adapter.hops().into_iter().filter(|hop| hop.1 != B).collect();
        assert!(succeeded.chunks(2).all(|chunk| chunk == [(A, E), (E, C)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_aborts_when_every_neighbour_failed() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Failed);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_catalog(catalog_with_pairs(&[(A, B)]));

        let status = h
            .executor
            .run_task(&Account::new("0x01"), &mut ctx(1), &mut swap_task(A.into(), B.into(), 2))
            .await;
        assert_eq!(status, TransactionStatus::Failed);
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_token_graph_fails_multi_hop_chain() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()));

        let mut task = swap_task(E.into(), A.into(), 3)
            .with_param(keys::SWAP_TOKENS, SettingValue::Tokens([E].into_iter().collect()));
        let status = h.executor.run_task(&Account::new("0x01"), &mut ctx(1), &mut task).await;
        assert_eq!(status, TransactionStatus::Failed);
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_hop_onto_start_picks_random_end() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()));

        let status = h
            .executor
            .run_task(&Account::new("0x01"), &mut ctx(4), &mut swap_task(E.into(), E.into(), 1))
            .await;
        assert_eq!(status, TransactionStatus::Success);
        let hops = adapter.hops();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].0, E);
        assert_ne!(hops[0].1, E);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_swaps_each_token_above_floor_once() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_balances(
                FixedBalances::new()
                    .with_balance(A, 10.0)
                    .with_balance(B, 0.5)
                    .with_balance(C, 3.0)
                    .with_balance(E, 7.0),
            );

        let mut task = swap_task(TokenSelector::All, E.into(), 5)
            .with_param(keys::MIN_AMOUNT, SettingValue::Number(1.0))
            .with_param(keys::MAX_AMOUNT, SettingValue::Number(2.0));
        let status = h.executor.run_task(&Account::new("0x01"), &mut ctx(2), &mut task).await;
        assert_eq!(status, TransactionStatus::Success);

        let mut hops = adapter.hops();
        hops.sort();
        assert_eq!(hops, vec![(A, E), (C, E)]);
        for call in adapter.recorded() {
            assert!(!call.params.contains(keys::MIN_AMOUNT));
            assert_eq!(call.params.usize(keys::SWAPS), Some(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_without_balances_is_a_no_op() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()));

        let mut task = swap_task(TokenSelector::All, E.into(), 5);
        let status = h.executor.run_task(&Account::new("0x01"), &mut ctx(2), &mut task).await;
        assert_eq!(status, TransactionStatus::Success);
        assert_eq!(adapter.calls(), 0);

        let mut task = task.with_param(keys::MIN_AMOUNT_USD, SettingValue::Number(5.0));
        let status = h.executor.run_task(&Account::new("0x01"), &mut ctx(2), &mut task).await;
        assert_eq!(status, TransactionStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_applies_usd_floor() {
        let adapter = ScriptedAdapter::always(TransactionStatus::Success);
        let mut balances = FixedBalances::new()
            .with_balance(A, 4.0)
            .with_balance(D, 0.001);
        for token in [A, B, C, D] {
            balances = balances.with_price(token, if token == D { 30_000.0 } else { 1.0 });
        }
        let h = harness(|registry| registry.register_module(ModuleName::Avnu, adapter.clone()))
            .with_balances(balances);

        let mut task = swap_task(TokenSelector::All, E.into(), 5)
            .with_param(keys::MIN_AMOUNT_USD, SettingValue::Number(5.0));
        h.executor.run_task(&Account::new("0x01"), &mut ctx(2), &mut task).await;
        assert_eq!(adapter.hops(), vec![(D, E)]);
    }
}
