// ==========================================
// 泊位维修周计划排程系统 - 作业依赖图
// ==========================================
// 职责: 维护 作业→前置作业 有向边, 回答:
//   - 新增边是否成环
//   - 合法执行顺序（同层按优先级分数）
//   - 就绪作业集合
// 红线: 拒绝自环/重复边/成环边, 被拒绝时图保持不变
// ==========================================

use crate::domain::plan::{Job, JobDependency};
use crate::domain::types::JobId;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::priority::PriorityScorer;
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

// ==========================================
// DependencyGraph - 作业依赖图
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// job → 其前置作业集合
    depends_on: BTreeMap<JobId, BTreeSet<JobId>>,
    /// job → 依赖它的作业集合
    dependents: BTreeMap<JobId, BTreeSet<JobId>>,
    edges: BTreeMap<(JobId, JobId), JobDependency>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由已有依赖数据构建（不做环校验, 脏数据由 detect_cycles 报告）
    pub fn from_dependencies(dependencies: &[JobDependency]) -> Self {
        let mut graph = Self::new();
        for dep in dependencies {
            if dep.job_id == dep.depends_on_job_id {
                // 自环按环处理
                graph.insert_edge(dep.clone());
                continue;
            }
            if !graph.has_edge(dep.job_id, dep.depends_on_job_id) {
                graph.insert_edge(dep.clone());
            }
        }
        graph
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = &JobDependency> {
        self.edges.values()
    }

    pub fn has_edge(&self, job_id: JobId, depends_on_job_id: JobId) -> bool {
        self.edges.contains_key(&(job_id, depends_on_job_id))
    }

    /// 直接前置作业
    pub fn prerequisites(&self, job_id: JobId) -> Vec<JobId> {
        self.depends_on
            .get(&job_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 直接后继作业
    pub fn dependents(&self, job_id: JobId) -> Vec<JobId> {
        self.dependents
            .get(&job_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    // ==========================================
    // 边维护
    // ==========================================

    /// 新增依赖边 `job_id depends_on depends_on_job_id`
    ///
    /// # 返回
    /// - `Err(CircularDependency)`: 自环, 或 depends_on_job_id 已(传递)依赖 job_id
    /// - `Err(Validation)`: 重复边或 lag 为负
    pub fn add_dependency(&mut self, dependency: JobDependency) -> EngineResult<()> {
        let (job_id, on) = (dependency.job_id, dependency.depends_on_job_id);
        if self.would_create_cycle(job_id, on) {
            return Err(EngineError::CircularDependency {
                job_id,
                depends_on_job_id: on,
            });
        }
        if self.has_edge(job_id, on) {
            return Err(EngineError::Validation(format!(
                "依赖已存在: {} -> {}",
                job_id, on
            )));
        }
        if dependency.lag_minutes < 0 {
            return Err(EngineError::Validation(format!(
                "依赖间隔不能为负: {}",
                dependency.lag_minutes
            )));
        }
        self.insert_edge(dependency);
        Ok(())
    }

    pub fn remove_dependency(&mut self, job_id: JobId, depends_on_job_id: JobId) -> bool {
        if self.edges.remove(&(job_id, depends_on_job_id)).is_none() {
            return false;
        }
        if let Some(set) = self.depends_on.get_mut(&job_id) {
            set.remove(&depends_on_job_id);
        }
        if let Some(set) = self.dependents.get_mut(&depends_on_job_id) {
            set.remove(&job_id);
        }
        true
    }

    /// 删除作业时清理所有相关边
    ///
    /// # 返回
    /// 被删除的边
    pub fn remove_job(&mut self, job_id: JobId) -> Vec<JobDependency> {
        let touching: Vec<(JobId, JobId)> = self
            .edges
            .keys()
            .filter(|(a, b)| *a == job_id || *b == job_id)
            .copied()
            .collect();
        let mut removed = Vec::with_capacity(touching.len());
        for key in touching {
            if let Some(dep) = self.edges.get(&key).cloned() {
                self.remove_dependency(key.0, key.1);
                removed.push(dep);
            }
        }
        self.depends_on.remove(&job_id);
        self.dependents.remove(&job_id);
        removed
    }

    /// 新增边是否成环（反向可达性检查）
    pub fn would_create_cycle(&self, job_id: JobId, depends_on_job_id: JobId) -> bool {
        job_id == depends_on_job_id
            || self
                .transitive_prerequisites(depends_on_job_id)
                .contains(&job_id)
    }

    /// 全部(传递)前置作业
    pub fn transitive_prerequisites(&self, job_id: JobId) -> BTreeSet<JobId> {
        Self::reach(&self.depends_on, job_id)
    }

    /// 全部(传递)后继作业
    pub fn transitive_dependents(&self, job_id: JobId) -> BTreeSet<JobId> {
        Self::reach(&self.dependents, job_id)
    }

    fn reach(adjacency: &BTreeMap<JobId, BTreeSet<JobId>>, start: JobId) -> BTreeSet<JobId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if let Some(next) = adjacency.get(&node) {
                for n in next {
                    if seen.insert(*n) {
                        stack.push(*n);
                    }
                }
            }
        }
        seen
    }

    fn insert_edge(&mut self, dependency: JobDependency) {
        let (job_id, on) = (dependency.job_id, dependency.depends_on_job_id);
        self.depends_on.entry(job_id).or_default().insert(on);
        self.dependents.entry(on).or_default().insert(job_id);
        self.edges.insert((job_id, on), dependency);
    }

    // ==========================================
    // 环检测 (DFS 三色标记)
    // ==========================================

    /// 检测现有数据中的环
    ///
    /// # 返回
    /// 每个环的作业列表（从环内最小 id 开始, 按 depends_on 方向）
    pub fn detect_cycles(&self) -> Vec<Vec<JobId>> {
        let mut visited = BTreeSet::new();
        let mut on_stack = Vec::new();
        let mut cycles = BTreeSet::new();
        for node in self.depends_on.keys() {
            if !visited.contains(node) {
                self.cycle_dfs(*node, &mut visited, &mut on_stack, &mut cycles);
            }
        }
        cycles.into_iter().collect()
    }

    fn cycle_dfs(
        &self,
        node: JobId,
        visited: &mut BTreeSet<JobId>,
        on_stack: &mut Vec<JobId>,
        cycles: &mut BTreeSet<Vec<JobId>>,
    ) {
        visited.insert(node);
        on_stack.push(node);
        if let Some(next) = self.depends_on.get(&node) {
            for n in next {
                if let Some(pos) = on_stack.iter().position(|x| x == n) {
                    cycles.insert(Self::canonical_cycle(&on_stack[pos..]));
                } else if !visited.contains(n) {
                    self.cycle_dfs(*n, visited, on_stack, cycles);
                }
            }
        }
        on_stack.pop();
    }

    fn canonical_cycle(path: &[JobId]) -> Vec<JobId> {
        let start = path
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map(|(i, _)| i)
            .unwrap_or(0);
        path[start..].iter().chain(path[..start].iter()).copied().collect()
    }

    // ==========================================
    // 拓扑排序 (Kahn, 同层按优先级分数)
    // ==========================================

    /// 执行顺序（前置作业在前）
    ///
    /// 仅考虑 `jobs` 内的作业; 指向集合外作业的边忽略
    ///
    /// # 返回
    /// - `Err(CircularDependency)`: 集合内存在环
    pub fn execution_order(
        &self,
        jobs: &BTreeMap<JobId, Job>,
        scorer: &PriorityScorer,
        today: NaiveDate,
    ) -> EngineResult<Vec<JobId>> {
        let mut in_degree: HashMap<JobId, usize> = jobs.keys().map(|id| (*id, 0)).collect();
        for (job_id, prereqs) in &self.depends_on {
            if !jobs.contains_key(job_id) {
                continue;
            }
            let count = prereqs.iter().filter(|p| jobs.contains_key(p)).count();
            in_degree.insert(*job_id, count);
        }

        let key = |id: JobId| {
            let score = jobs.get(&id).map_or(0, |j| scorer.score(j, today));
            (score, Reverse(id))
        };

        let mut heap: BinaryHeap<(i64, Reverse<JobId>)> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| key(*id))
            .collect();

        let mut order = Vec::with_capacity(jobs.len());
        while let Some((_, Reverse(id))) = heap.pop() {
            order.push(id);
            for dependent in self.dependents(id) {
                if let Some(deg) = in_degree.get_mut(&dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        heap.push(key(dependent));
                    }
                }
            }
        }

        if order.len() < jobs.len() {
            let blocked = in_degree
                .iter()
                .filter(|(_, deg)| **deg > 0)
                .map(|(id, _)| *id)
                .min()
                .unwrap_or(0);
            let on = self
                .prerequisites(blocked)
                .into_iter()
                .find(|p| jobs.contains_key(p))
                .unwrap_or(blocked);
            return Err(EngineError::CircularDependency {
                job_id: blocked,
                depends_on_job_id: on,
            });
        }
        Ok(order)
    }

    /// 就绪作业: 未完成, 且所有前置作业已完成（集合外前置视为已满足）
    pub fn ready_jobs(&self, known: &BTreeSet<JobId>, completed: &BTreeSet<JobId>) -> Vec<JobId> {
        known
            .iter()
            .filter(|id| !completed.contains(id))
            .filter(|id| {
                self.depends_on.get(id).map_or(true, |prereqs| {
                    prereqs
                        .iter()
                        .all(|p| completed.contains(p) || !known.contains(p))
                })
            })
            .copied()
            .collect()
    }
}
