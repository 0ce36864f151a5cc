/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

pub mod execution_context;
pub mod operation_registry;
pub mod operation_result;
pub mod stream_entry;

pub use execution_context::DiscardMessageHandler;
pub use execution_context::MessageHandler;
pub use execution_context::OperationExecutionContext;
pub use operation_registry::ActiveOperationRegistry;
pub use operation_registry::CompletedCallback;
pub use operation_registry::CompletedOutcome;
pub use operation_result::OperationHandle;
pub use operation_result::OperationOutcome;
pub use operation_result::OperationState;
pub use operation_result::ResponsePayload;
pub use stream_entry::InputStreamEntry;
