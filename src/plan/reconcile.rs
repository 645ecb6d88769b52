//! 任务清单合并
//!
//! 规划循环每轮可能重发部分或全量任务清单，需与已累积的清单按 index 合并：
//! 先以次要清单灌入映射，再用主要清单覆盖，主要清单在键冲突时必胜；
//! 输出按 index 升序，每个 index 恰好一项。规划器以「既有清单为主、新产出为次」
//! 调用，已执行任务的结果不会被重规划悄悄冲掉。

use std::collections::BTreeMap;

use crate::plan::TaskItem;

/// 合并两份任务清单：primary 在 index 冲突时胜出，并集按 index 升序
pub fn merge_task_lists(primary: &[TaskItem], secondary: &[TaskItem]) -> Vec<TaskItem> {
    let mut by_index: BTreeMap<i64, TaskItem> = BTreeMap::new();
    for item in secondary {
        by_index.insert(item.index, item.clone());
    }
    for item in primary {
        by_index.insert(item.index, item.clone());
    }
    by_index.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: i64, task: &str) -> TaskItem {
        TaskItem {
            index,
            task: task.to_string(),
            goal: String::new(),
            desc: String::new(),
            correlation: 3,
            extra_info: String::new(),
            result: None,
        }
    }

    #[test]
    fn test_merge_empty_primary() {
        let merged = merge_task_lists(&[], &[item(1, "A")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].index, 1);
        assert_eq!(merged[0].task, "A");
    }

    #[test]
    fn test_merge_primary_wins_on_collision() {
        let prior = vec![item(1, "A")];
        let fresh = vec![item(1, "B"), item(2, "C")];
        let merged = merge_task_lists(&prior, &fresh);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].index, 1);
        assert_eq!(merged[0].task, "A");
        assert_eq!(merged[1].index, 2);
        assert_eq!(merged[1].task, "C");
    }

    #[test]
    fn test_merge_sorted_by_index_regardless_of_input_order() {
        let prior = vec![item(5, "E"), item(1, "A")];
        let fresh = vec![item(3, "C"), item(2, "B")];
        let merged = merge_task_lists(&prior, &fresh);
        let indices: Vec<i64> = merged.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_merge_no_duplicate_index() {
        let prior = vec![item(1, "A"), item(2, "B")];
        let fresh = vec![item(2, "B2"), item(3, "C")];
        let merged = merge_task_lists(&prior, &fresh);
        let mut indices: Vec<i64> = merged.iter().map(|t| t.index).collect();
        indices.dedup();
        assert_eq!(indices.len(), merged.len());
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_preserves_executed_result() {
        let mut done = item(1, "已完成的任务");
        done.result = Some("结果数据".to_string());
        let fresh = vec![item(1, "重规划的同名任务"), item(2, "新任务")];
        let merged = merge_task_lists(&[done], &fresh);
        assert_eq!(merged[0].result.as_deref(), Some("结果数据"));
        assert_eq!(merged[0].task, "已完成的任务");
        assert!(merged[1].result.is_none());
    }

    #[test]
    fn test_merge_both_empty() {
        assert!(merge_task_lists(&[], &[]).is_empty());
    }
}
