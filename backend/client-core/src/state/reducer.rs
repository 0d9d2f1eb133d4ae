use crate::state::mutation::Mutation;
use crate::state::tree::{AppState, MAX_LOG_RECORDS, MAX_USER_MESSAGES, Plot};

use models::NodeId;

use log::trace;
use serde_json::Value;

impl AppState {
    /// Apply one mutation in place.
    pub fn apply(&mut self, mutation: &Mutation) {
        trace!("Applying {mutation:?}");

        match mutation {
            Mutation::AddUserMessage(record) => {
                push_capped(&mut self.general.user_messages, record.clone(), MAX_USER_MESSAGES);
            }
            Mutation::AddLogRecord(record) => {
                push_capped(&mut self.logger.records, record.clone(), MAX_LOG_RECORDS);
            }
            Mutation::IncChatMessageCount => {
                self.remote_access.chat_message_count += 1;
            }

            Mutation::SaveMotorPosition { name, position } => {
                self.sample_view.motors.entry(name.clone()).or_default().position = *position;
            }
            Mutation::UpdateMotorState { name, state } => {
                self.sample_view.motors.entry(name.clone()).or_default().state = state.clone();
            }
            Mutation::SetShapes(shapes) => {
                self.sample_view.shapes = shapes.clone();
            }
            Mutation::UpdateShapes(shapes) => {
                for shape in shapes {
                    if let Some(id) = shape.get("id").and_then(Value::as_str) {
                        self.sample_view.shapes.insert(id.to_string(), shape.clone());
                    }
                }
            }
            Mutation::SetPixelsPerMm(pixels) => {
                self.sample_view.pixels_per_mm = pixels.clone();
            }
            Mutation::SetBeamInfo(info) => {
                self.sample_view.beam_info = info.clone();
            }
            Mutation::SetCurrentPhase(phase) => {
                self.sample_view.current_phase = phase.clone();
            }
            Mutation::StartClickCentring => {
                self.sample_view.click_centring = true;
            }
            Mutation::VideoMessageOverlay { show, message } => {
                self.sample_view.video_message_overlay = show.then(|| message.clone());
            }

            Mutation::SetMachInfo(info) => {
                self.beamline.mach_info = info.clone();
            }
            Mutation::SetBeamlineAttribute(attribute) => {
                self.beamline
                    .attributes
                    .insert(attribute.name.clone(), attribute.clone());
            }
            Mutation::SetEnergyScanResult(scan) => {
                self.task_result.energy_scan = Some(scan.clone());
            }

            Mutation::UpdateTaskLimsData(lims) => {
                let queue = &mut self.shared.queue;
                for result in queue.task_results.values_mut() {
                    if result.sample == lims.sample && result.task_index == Some(lims.task_index) {
                        result.lims_result_data = lims.lims_result_data.clone();
                    }
                }
            }
            Mutation::CollapseItem(node) => {
                let display = self
                    .shared
                    .queue_gui
                    .display_data
                    .entry(node.clone())
                    .or_default();
                display.collapsed = !display.collapsed;
            }
            Mutation::AddTaskResult(record) => {
                self.shared
                    .queue
                    .task_results
                    .insert(record.queue_id.clone(), record.clone());
            }
            Mutation::AddTasks(tasks) => {
                for task in tasks {
                    let Some(node) = task.get("queueID").and_then(NodeId::from_value) else {
                        continue;
                    };
                    self.shared.queue.tasks.insert(node.clone(), task.clone());
                    self.shared
                        .queue_gui
                        .display_data
                        .entry(node)
                        .or_default();
                }
            }
            Mutation::AddDiffractionPlan(tasks) => {
                self.shared
                    .queue
                    .diffraction_plans
                    .extend(tasks.iter().cloned());
            }
            Mutation::SetSampleAttribute {
                sample_id,
                attribute,
                value,
            } => {
                self.shared
                    .queue
                    .samples
                    .entry(sample_id.clone())
                    .or_default()
                    .insert(attribute.clone(), value.clone());
            }
            Mutation::SetQueueStatus(status) => {
                self.shared.queue.status = status.clone();
            }
            Mutation::SetCurrentSample(sample_id) => {
                self.shared.queue.current_sample = Some(sample_id.clone());
            }

            Mutation::SetLoading(notice) => {
                self.general.loading = Some(notice.clone());
            }
            Mutation::ShowConnectionLostDialog(show) => {
                self.general.show_connection_lost_dialog = *show;
            }
            Mutation::ShowResumeQueueDialog(show) => {
                self.shared.queue_gui.show_resume_queue_dialog = *show;
            }
            Mutation::ShowWorkflowParametersDialog(parameters) => {
                self.shared.workflow.show_dialog = !parameters.is_null();
                self.shared.workflow.parameters = parameters.clone();
            }

            Mutation::SetActionState { name, state, data } => {
                let action = self
                    .shared
                    .beamline_actions
                    .actions
                    .entry(name.clone())
                    .or_default();
                action.state = state.clone();
                action.data = data.clone();
            }
            Mutation::SetScState(state) => {
                self.sample_changer.state = state.clone();
            }
            Mutation::SetLoadedSample(sample) => {
                self.sample_changer.loaded_sample = sample.clone();
            }
            Mutation::SetScGlobalState(state) => {
                self.sample_changer.global_state = state.clone();
            }
            Mutation::SetScContents(contents) => {
                self.sample_changer.contents = contents.clone();
            }

            Mutation::NewPlot(info) => {
                if let Some(id) = info.get("id").and_then(NodeId::from_value) {
                    self.plots.plots.insert(
                        id,
                        Plot {
                            info: info.clone(),
                            ..Plot::default()
                        },
                    );
                }
            }
            Mutation::PlotData { id, data, end } => {
                let plot = self.plots.plots.entry(id.clone()).or_default();
                if !data.is_null() {
                    plot.data.push(data.clone());
                }
                plot.ended |= *end;
            }
            Mutation::PlotEnd(id) => {
                self.plots.plots.entry(id.clone()).or_default().ended = true;
            }

            Mutation::SetRemoteAccess(data) => {
                self.remote_access.data = data.clone();
            }
            Mutation::SetLoginInfo(info) => {
                self.login.info = info.clone();
            }
            Mutation::SignedOut => {
                self.login = Default::default();
            }
        }
    }
}

fn push_capped<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}
