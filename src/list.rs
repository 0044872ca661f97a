//! # Task Lists
//!
//! Singly-linked queues threaded through the task pool. A list stores only
//! its head and tail; the links are the `next` field of each TCB, so a task
//! can belong to exactly one list at a time and moving it between lists
//! never allocates.
//!
//! All operations take the task pool explicitly. The caller holds the kernel
//! critical section for the whole move.

use crate::task::{TaskControlBlock, TaskId};

/// FIFO of task ids linked through `TaskControlBlock::next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskList {
    head: Option<TaskId>,
    tail: Option<TaskId>,
}

impl TaskList {
    pub const fn new() -> Self {
        Self { head: None, tail: None }
    }

    /// List over links the caller has already threaded through the pool.
    pub(crate) const fn from_parts(head: Option<TaskId>, tail: Option<TaskId>) -> Self {
        Self { head, tail }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    pub fn push_head(&mut self, tasks: &mut [TaskControlBlock], id: TaskId) {
        tasks[id.index()].next = self.head;
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    pub fn push_tail(&mut self, tasks: &mut [TaskControlBlock], id: TaskId) {
        tasks[id.index()].next = None;
        match self.tail {
            Some(tail) => tasks[tail.index()].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    pub fn pop_head(&mut self, tasks: &mut [TaskControlBlock]) -> Option<TaskId> {
        let id = self.head?;
        self.head = tasks[id.index()].next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        Some(id)
    }

    /// Unlink `id` wherever it sits. Returns false if it is not a member.
    pub fn remove(&mut self, tasks: &mut [TaskControlBlock], id: TaskId) -> bool {
        let mut prev: Option<TaskId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if current == id {
                let next = tasks[current.index()].next.take();
                match prev {
                    Some(p) => tasks[p.index()].next = next,
                    None => self.head = next,
                }
                if self.tail == Some(id) {
                    self.tail = prev;
                }
                return true;
            }
            prev = cursor;
            cursor = tasks[current.index()].next;
        }
        false
    }

    /// Insert `id` before the first member whose key is strictly greater,
    /// so equal keys keep arrival order.
    pub fn insert_by_key<K, F>(&mut self, tasks: &mut [TaskControlBlock], id: TaskId, key: F)
    where
        K: Ord,
        F: Fn(&TaskControlBlock) -> K,
    {
        let new_key = key(&tasks[id.index()]);
        let mut prev: Option<TaskId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if key(&tasks[current.index()]) > new_key {
                break;
            }
            prev = cursor;
            cursor = tasks[current.index()].next;
        }
        match prev {
            None => self.push_head(tasks, id),
            Some(p) => {
                tasks[id.index()].next = cursor;
                tasks[p.index()].next = Some(id);
                if cursor.is_none() {
                    self.tail = Some(id);
                }
            }
        }
    }

    /// Walk the members front to back.
    pub fn iter<'a>(&self, tasks: &'a [TaskControlBlock]) -> Iter<'a> {
        Iter { tasks, cursor: self.head }
    }

    pub fn len(&self, tasks: &[TaskControlBlock]) -> usize {
        self.iter(tasks).count()
    }

    pub fn contains(&self, tasks: &[TaskControlBlock], id: TaskId) -> bool {
        self.iter(tasks).any(|member| member == id)
    }
}

impl Default for TaskList {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a> {
    tasks: &'a [TaskControlBlock],
    cursor: Option<TaskId>,
}

impl Iterator for Iter<'_> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        let id = self.cursor?;
        self.cursor = self.tasks[id.index()].next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> [TaskControlBlock; 5] {
        let mut tasks = [TaskControlBlock::EMPTY; 5];
        for (i, tcb) in tasks.iter_mut().enumerate() {
            tcb.id = TaskId::new(i);
        }
        tasks
    }

    fn ids(list: &TaskList, tasks: &[TaskControlBlock]) -> Vec<usize> {
        list.iter(tasks).map(TaskId::index).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut tasks = pool();
        let mut list = TaskList::new();
        for i in 0..3 {
            list.push_tail(&mut tasks, TaskId::new(i));
        }
        assert_eq!(ids(&list, &tasks), vec![0, 1, 2]);
        assert_eq!(list.pop_head(&mut tasks), Some(TaskId::new(0)));
        assert_eq!(list.pop_head(&mut tasks), Some(TaskId::new(1)));
        list.push_tail(&mut tasks, TaskId::new(0));
        assert_eq!(ids(&list, &tasks), vec![2, 0]);
    }

    #[test]
    fn test_push_head_jumps_queue() {
        let mut tasks = pool();
        let mut list = TaskList::new();
        list.push_tail(&mut tasks, TaskId::new(1));
        list.push_head(&mut tasks, TaskId::new(4));
        assert_eq!(ids(&list, &tasks), vec![4, 1]);
        list.push_tail(&mut tasks, TaskId::new(2));
        assert_eq!(ids(&list, &tasks), vec![4, 1, 2]);
    }

    #[test]
    fn test_pop_empty_list() {
        let mut tasks = pool();
        let mut list = TaskList::new();
        assert_eq!(list.pop_head(&mut tasks), None);
        list.push_head(&mut tasks, TaskId::new(3));
        assert_eq!(list.pop_head(&mut tasks), Some(TaskId::new(3)));
        assert!(list.is_empty());
        list.push_tail(&mut tasks, TaskId::new(2));
        assert_eq!(ids(&list, &tasks), vec![2]);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut tasks = pool();
        let mut list = TaskList::new();
        for i in 0..4 {
            list.push_tail(&mut tasks, TaskId::new(i));
        }
        assert!(list.remove(&mut tasks, TaskId::new(2)));
        assert_eq!(ids(&list, &tasks), vec![0, 1, 3]);
        assert!(list.remove(&mut tasks, TaskId::new(3)));
        assert_eq!(ids(&list, &tasks), vec![0, 1]);
        // tail must be repaired, appending goes after 1
        list.push_tail(&mut tasks, TaskId::new(4));
        assert_eq!(ids(&list, &tasks), vec![0, 1, 4]);
        assert!(list.remove(&mut tasks, TaskId::new(0)));
        assert_eq!(ids(&list, &tasks), vec![1, 4]);
        assert!(!list.remove(&mut tasks, TaskId::new(0)));
    }

    #[test]
    fn test_insert_by_key_is_stable() {
        let mut tasks = pool();
        let keys = [5u32, 1, 5, 3, 9];
        for (tcb, key) in tasks.iter_mut().zip(keys) {
            tcb.wake_tick = key;
        }
        let mut list = TaskList::new();
        for i in 0..5 {
            list.insert_by_key(&mut tasks, TaskId::new(i), |t| t.wake_tick);
        }
        assert_eq!(ids(&list, &tasks), vec![1, 3, 0, 2, 4]);
        assert_eq!(list.len(&tasks), 5);
        assert!(list.contains(&tasks, TaskId::new(4)));
        // tail is the largest key
        assert!(list.remove(&mut tasks, TaskId::new(4)));
        list.push_tail(&mut tasks, TaskId::new(4));
        assert_eq!(ids(&list, &tasks), vec![1, 3, 0, 2, 4]);
    }
}
